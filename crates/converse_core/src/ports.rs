//! crates/converse_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::domain::{ChatSummary, RouterDecision, SearchContext, StoredTurn, Turn, User, UserCredentials};

//=========================================================================================
// Gateway and Store Error Types
//=========================================================================================

/// Errors raised by the outbound gateways (model completion, web search).
///
/// The two variants are deliberately distinct so callers can choose different
/// fallback behavior for a provider that rejected the call versus one that
/// answered with an envelope we cannot use.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The provider returned a non-success status. Carries the provider's own
    /// error message when one could be extracted, else a generic status line.
    #[error("Upstream provider error: {0}")]
    Upstream(String),
    /// The provider returned a success status but the body was unparseable or
    /// contained no usable text.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// A convenience type alias for `Result<T, GatewayError>`.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised by the persistence port.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The Model Gateway port: one completion over a conversation history.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends the turns (and optional system instruction) to the model and
    /// returns the generated text.
    async fn complete(
        &self,
        turns: &[Turn],
        system_instruction: Option<&str>,
    ) -> GatewayResult<String>;
}

/// The Search Gateway port.
///
/// Search is a best-effort enhancement: implementations return an empty
/// context on missing credentials or provider failure instead of erroring.
#[async_trait]
pub trait WebSearchService: Send + Sync {
    async fn search(&self, query: &str) -> GatewayResult<SearchContext>;
}

/// Selects an intent for the latest user utterance.
///
/// Infallible by contract: implementations swallow their own failures and
/// fall back to `GeneralConversation` so the user always receives an answer.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, latest_user_text: &str) -> RouterDecision;
}

/// Rewrites a user utterance into a better search query.
///
/// Returns `None` on failure; the caller then searches with the literal text.
#[async_trait]
pub trait QueryRewriteService: Send + Sync {
    async fn rewrite(&self, text: &str) -> Option<String>;
}

/// Extracts an IANA timezone mentioned in an utterance ("time in London").
///
/// Returns `None` when no zone is mentioned or extraction fails; the caller
/// then uses the configured default zone.
#[async_trait]
pub trait TimezoneLookup: Send + Sync {
    async fn extract(&self, text: &str) -> Option<Tz>;
}

/// Generates a short human-readable title from the opening turns of a chat.
#[async_trait]
pub trait TitleService: Send + Sync {
    async fn generate(&self, turns: &[Turn]) -> GatewayResult<String>;
}

/// A source of the current instant, injected so date/time answers are
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//=========================================================================================
// Persistence Ports
//=========================================================================================

/// Conversation persistence, keyed by user identity.
///
/// The store must preserve write order within a conversation: `list_turns`
/// returns turns ascending by write time, and `append_turn` reports the
/// timestamp the store assigned.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, user_id: Uuid, title: &str) -> StoreResult<ChatSummary>;

    async fn get_chat(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<ChatSummary>;

    /// Lists the user's chats, newest first.
    async fn list_chats(&self, user_id: Uuid) -> StoreResult<Vec<ChatSummary>>;

    async fn rename_chat(&self, user_id: Uuid, chat_id: Uuid, title: &str) -> StoreResult<()>;

    /// Deletes the chat and every turn recorded under it.
    async fn delete_chat(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<()>;

    async fn append_turn(&self, chat_id: Uuid, turn: &Turn) -> StoreResult<StoredTurn>;

    /// Lists the turns of a chat in conversational (write) order.
    async fn list_turns(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<Vec<StoredTurn>>;
}

/// User accounts and bearer auth sessions.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> StoreResult<User>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Validates a bearer token and yields the stable user identifier.
    async fn validate_auth_session(&self, session_id: &str) -> StoreResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()>;
}
