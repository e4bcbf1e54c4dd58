//! services/api/src/web/testing.rs
//!
//! In-memory fakes shared by the handler tests. Everything here lives behind
//! `#[cfg(test)]` in the module tree.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use converse_core::domain::{
    ChatSummary, Role, SearchContext, StoredTurn, Turn, User, UserCredentials, PLACEHOLDER_TITLE,
};
use converse_core::ports::{
    ChatStore, Clock, CompletionService, GatewayError, GatewayResult, IdentityStore,
    QueryRewriteService, StoreError, StoreResult, TimezoneLookup, TitleService, WebSearchService,
};
use converse_core::router::HeuristicClassifier;
use converse_core::synthesizer::Synthesizer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::config::Config;
use crate::web::protocol::{WirePart, WireTurn};
use crate::web::state::AppState;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap()
}

//=========================================================================================
// In-memory chat store
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    chats: Mutex<HashMap<Uuid, ChatSummary>>,
    turns: Mutex<Vec<StoredTurn>>,
    writes: Mutex<u32>,
}

impl MemoryStore {
    pub fn stored_turns(&self) -> Vec<StoredTurn> {
        self.turns.lock().unwrap().clone()
    }

    pub fn seed_chat(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.chats.lock().unwrap().insert(
            id,
            ChatSummary {
                id,
                user_id,
                title: PLACEHOLDER_TITLE.to_string(),
                created_at: base_time(),
            },
        );
        id
    }

    pub fn seed_turn(&self, chat_id: Uuid, role: Role, text: &str) {
        let mut writes = self.writes.lock().unwrap();
        *writes += 1;
        self.turns.lock().unwrap().push(StoredTurn {
            id: Uuid::new_v4(),
            chat_id,
            role,
            text: text.to_string(),
            created_at: base_time() + chrono::Duration::seconds(*writes as i64),
        });
    }

    pub fn title_of(&self, chat_id: Uuid) -> Option<String> {
        self.chats
            .lock()
            .unwrap()
            .get(&chat_id)
            .map(|chat| chat.title.clone())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_chat(&self, user_id: Uuid, title: &str) -> StoreResult<ChatSummary> {
        let summary = ChatSummary {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            created_at: base_time(),
        };
        self.chats.lock().unwrap().insert(summary.id, summary.clone());
        Ok(summary)
    }

    async fn get_chat(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<ChatSummary> {
        self.chats
            .lock()
            .unwrap()
            .get(&chat_id)
            .filter(|chat| chat.user_id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Chat {} not found", chat_id)))
    }

    async fn list_chats(&self, user_id: Uuid) -> StoreResult<Vec<ChatSummary>> {
        let mut chats: Vec<ChatSummary> = self
            .chats
            .lock()
            .unwrap()
            .values()
            .filter(|chat| chat.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn rename_chat(&self, user_id: Uuid, chat_id: Uuid, title: &str) -> StoreResult<()> {
        let mut chats = self.chats.lock().unwrap();
        let chat = chats
            .get_mut(&chat_id)
            .filter(|chat| chat.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("Chat {} not found", chat_id)))?;
        chat.title = title.to_string();
        Ok(())
    }

    async fn delete_chat(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<()> {
        let removed = {
            let mut chats = self.chats.lock().unwrap();
            match chats.get(&chat_id) {
                Some(chat) if chat.user_id == user_id => {
                    chats.remove(&chat_id);
                    true
                }
                _ => false,
            }
        };
        if !removed {
            return Err(StoreError::NotFound(format!("Chat {} not found", chat_id)));
        }
        self.turns.lock().unwrap().retain(|turn| turn.chat_id != chat_id);
        Ok(())
    }

    async fn append_turn(&self, chat_id: Uuid, turn: &Turn) -> StoreResult<StoredTurn> {
        // Each write lands one second after the previous one so ordering
        // assertions are strict.
        let mut writes = self.writes.lock().unwrap();
        *writes += 1;
        let stored = StoredTurn {
            id: Uuid::new_v4(),
            chat_id,
            role: turn.role,
            text: turn.text.clone(),
            created_at: base_time() + chrono::Duration::seconds(*writes as i64),
        };
        self.turns.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list_turns(&self, user_id: Uuid, chat_id: Uuid) -> StoreResult<Vec<StoredTurn>> {
        self.get_chat(user_id, chat_id).await?;
        Ok(self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|turn| turn.chat_id == chat_id)
            .cloned()
            .collect())
    }
}

//=========================================================================================
// Identity store fake
//=========================================================================================

#[derive(Default)]
pub struct MemoryIdentity {
    sessions: Mutex<HashMap<String, Uuid>>,
}

#[async_trait]
impl IdentityStore for MemoryIdentity {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> StoreResult<User> {
        let _ = hashed_password;
        Ok(User {
            user_id: Uuid::new_v4(),
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<UserCredentials> {
        Err(StoreError::NotFound(format!("User with email {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        _expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), user_id);
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> StoreResult<Uuid> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .copied()
            .ok_or_else(|| StoreError::NotFound("Auth session not found or expired".to_string()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }
}

//=========================================================================================
// Gateway fakes
//=========================================================================================

pub struct FakeCompletion {
    pub reply: Option<String>,
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(
        &self,
        _turns: &[Turn],
        _system_instruction: Option<&str>,
    ) -> GatewayResult<String> {
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(GatewayError::Upstream("provider down".to_string())),
        }
    }
}

pub struct EmptySearch;

#[async_trait]
impl WebSearchService for EmptySearch {
    async fn search(&self, _query: &str) -> GatewayResult<SearchContext> {
        Ok(SearchContext::empty())
    }
}

pub struct NoRewrite;

#[async_trait]
impl QueryRewriteService for NoRewrite {
    async fn rewrite(&self, _text: &str) -> Option<String> {
        None
    }
}

pub struct NoTimezone;

#[async_trait]
impl TimezoneLookup for NoTimezone {
    async fn extract(&self, _text: &str) -> Option<chrono_tz::Tz> {
        None
    }
}

pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        base_time()
    }
}

/// Scripted title service: `Some(title)` succeeds, `None` fails.
pub struct ScriptedTitle(pub Option<String>);

#[async_trait]
impl TitleService for ScriptedTitle {
    async fn generate(&self, _turns: &[Turn]) -> GatewayResult<String> {
        match &self.0 {
            Some(title) => Ok(title.clone()),
            None => Err(GatewayError::Upstream("provider down".to_string())),
        }
    }
}

//=========================================================================================
// State construction
//=========================================================================================

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:3000".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        allowed_origin: "http://localhost:3000".to_string(),
        gemini_api_key: None,
        gemini_model: "gemini-2.5-flash".to_string(),
        gemini_base_url: "http://localhost".to_string(),
        search_api_key: None,
        search_engine_id: None,
        default_timezone: chrono_tz::UTC,
        request_timeout_secs: 30,
    }
}

/// Builds an `AppState` over the given store. `reply` scripts the completion
/// gateway (`None` makes every model call fail); `title` scripts the title
/// service.
pub fn app_state(
    store: Arc<MemoryStore>,
    reply: Option<&str>,
    title: ScriptedTitle,
) -> Arc<AppState> {
    let completions: Arc<dyn CompletionService> = Arc::new(FakeCompletion {
        reply: reply.map(str::to_string),
    });
    let synthesizer = Arc::new(Synthesizer::new(
        completions,
        Arc::new(EmptySearch),
        Arc::new(NoRewrite),
        Arc::new(NoTimezone),
        Arc::new(FixedClock),
        chrono_tz::UTC,
    ));
    Arc::new(AppState {
        chats: store,
        identity: Arc::new(MemoryIdentity::default()),
        classifier: Arc::new(HeuristicClassifier),
        synthesizer,
        titles: Arc::new(title),
        config: Arc::new(test_config()),
    })
}

pub fn wire_turn(role: &str, text: &str) -> WireTurn {
    WireTurn {
        role: role.to_string(),
        parts: vec![WirePart {
            text: text.to_string(),
        }],
    }
}
