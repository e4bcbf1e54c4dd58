//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ChatStore` and `IdentityStore` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use converse_core::domain::{ChatSummary, Role, StoredTurn, Turn, User, UserCredentials};
use converse_core::ports::{ChatStore, IdentityStore, StoreError, StoreResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ChatStore` and `IdentityStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Asserts the chat exists and belongs to the user.
    async fn assert_chat_owner(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<()> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM chats WHERE id = $1 AND user_id = $2",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;

        if exists == 0 {
            return Err(StoreError::NotFound(format!("Chat {} not found", chat_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: Some(self.email),
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ChatRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
}
impl ChatRecord {
    fn to_domain(self) -> ChatSummary {
        ChatSummary {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    role: String,
    body: String,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> StoreResult<StoredTurn> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            StoreError::Unexpected(format!("Unknown role '{}' in message {}", self.role, self.id))
        })?;
        Ok(StoredTurn {
            id: self.id,
            chat_id: self.chat_id,
            role,
            text: self.body,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `ChatStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatStore for DbAdapter {
    async fn create_chat(&self, user_id: Uuid, title: &str) -> StoreResult<ChatSummary> {
        let record = sqlx::query_as::<_, ChatRecord>(
            "INSERT INTO chats (id, user_id, title) VALUES ($1, $2, $3) \
             RETURNING id, user_id, title, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_chat(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<ChatSummary> {
        let record = sqlx::query_as::<_, ChatRecord>(
            "SELECT id, user_id, title, created_at FROM chats WHERE id = $1 AND user_id = $2",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::NotFound(format!("Chat {} not found", chat_id)),
            _ => StoreError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn list_chats(&self, user_id: Uuid) -> StoreResult<Vec<ChatSummary>> {
        let records = sqlx::query_as::<_, ChatRecord>(
            "SELECT id, user_id, title, created_at FROM chats WHERE user_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn rename_chat(&self, user_id: Uuid, chat_id: Uuid, title: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE chats SET title = $1 WHERE id = $2 AND user_id = $3")
            .bind(title)
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Chat {} not found", chat_id)));
        }
        Ok(())
    }

    async fn delete_chat(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<()> {
        // Messages go with the chat via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM chats WHERE id = $1 AND user_id = $2")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Chat {} not found", chat_id)));
        }
        Ok(())
    }

    async fn append_turn(&self, chat_id: Uuid, turn: &Turn) -> StoreResult<StoredTurn> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, chat_id, role, body) VALUES ($1, $2, $3, $4) \
             RETURNING id, chat_id, role, body, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(turn.role.as_str())
        .bind(&turn.text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn list_turns(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<Vec<StoredTurn>> {
        self.assert_chat_owner(user_id, chat_id).await?;

        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, chat_id, role, body, created_at FROM messages WHERE chat_id = $1 \
             ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

//=========================================================================================
// `IdentityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityStore for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> StoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                StoreError::NotFound(format!("User with email {} not found", email))
            }
            _ => StoreError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> StoreResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                StoreError::NotFound("Auth session not found or expired".to_string())
            }
            _ => StoreError::Unexpected(e.to_string()),
        })?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
