//! crates/converse_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The title a chat carries until the rename step has produced a real one.
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// The wire name used by the provider envelope and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "model" => Some(Role::Model),
            _ => None,
        }
    }
}

/// One message in a conversation. Ordering is significant: insertion order
/// is conversational order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A persisted turn, carrying the identity and write timestamp the store
/// assigned to it. Immutable once written.
#[derive(Debug, Clone)]
pub struct StoredTurn {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A conversation as listed in the sidebar.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

// Represents a user - used throughout the app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// The intent the router selects for one user utterance. Transient: derived
/// per request from the latest user turn only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterDecision {
    DateTimeQuery,
    WebSearch,
    GeneralConversation,
}

/// Condensed snippet text derived from search results. Exists only for the
/// duration of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchContext(String);

impl SearchContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
