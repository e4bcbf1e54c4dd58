//! services/api/src/web/chat.rs
//!
//! The chat endpoint: validates the inbound envelope, routes the latest user
//! utterance, synthesizes the answer, and records the exchange.
//!
//! Side-effect order within one request is strict: the user turn is written
//! before any model work, and the model turn only after a successful
//! synthesis. A failed final completion therefore leaves the user turn in
//! place and writes nothing else. When the client aborts, axum drops this
//! future, so pending upstream calls stop and unwritten turns are never
//! persisted.

use axum::{extract::State, Extension, Json};
use converse_core::domain::{Role, Turn, PLACEHOLDER_TITLE};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::protocol::{ChatRequest, ChatResponse};
use crate::web::state::AppState;

/// Answer one user message within a conversation.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer generated", body = ChatResponse),
        (status = 400, description = "Missing or invalid request fields"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Chat not found"),
        (status = 502, description = "The model provider failed")
    ),
    security(("bearer_token" = []))
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    // 1. Validate the envelope
    let history = req.to_domain_history().map_err(ApiError::Validation)?;
    let latest = history
        .last()
        .ok_or_else(|| ApiError::Validation("Conversation history is required.".to_string()))?;
    if latest.role != Role::User {
        return Err(ApiError::Validation(
            "The final history turn must come from the user.".to_string(),
        ));
    }
    let latest_text = latest.text.clone();
    let system_instruction = req.system_instruction_text();

    // 2. Resolve the conversation (ownership checked for existing ids)
    let chat = match req.chat_id {
        Some(chat_id) => state.chats.get_chat(user_id, chat_id).await?,
        None => state.chats.create_chat(user_id, PLACEHOLDER_TITLE).await?,
    };

    // 3. Record the user turn before any model work
    state
        .chats
        .append_turn(chat.id, &Turn::user(latest_text.clone()))
        .await?;

    // 4. Route and synthesize
    let decision = state.classifier.classify(&latest_text).await;
    info!("Routed message in chat {} as {:?}", chat.id, decision);

    let answer = state
        .synthesizer
        .synthesize(
            decision,
            &latest_text,
            &history,
            system_instruction.as_deref(),
        )
        .await
        .map_err(|e| {
            error!("Synthesis failed for chat {}: {}", chat.id, e);
            ApiError::Gateway(e)
        })?;

    // 5. Record the model turn
    state
        .chats
        .append_turn(chat.id, &Turn::model(answer.clone()))
        .await?;

    Ok(Json(ChatResponse::from_answer(answer, chat.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testing::{app_state, wire_turn, MemoryStore, ScriptedTitle};
    use converse_core::ports::StoreError;

    fn request(history: Vec<crate::web::protocol::WireTurn>, chat_id: Option<Uuid>) -> ChatRequest {
        ChatRequest {
            history,
            system_instruction: None,
            chat_id,
        }
    }

    #[tokio::test]
    async fn answers_and_persists_user_turn_before_model_turn() {
        let store = Arc::new(MemoryStore::default());
        let state = app_state(store.clone(), Some("a linked list is..."), ScriptedTitle(None));
        let user_id = Uuid::new_v4();
        let chat_id = store.seed_chat(user_id);

        let response = chat_handler(
            State(state),
            Extension(user_id),
            Json(request(
                vec![wire_turn("user", "explain linked lists")],
                Some(chat_id),
            )),
        )
        .await
        .unwrap();

        assert_eq!(
            response.0.candidates[0].content.parts[0].text,
            "a linked list is..."
        );
        assert_eq!(response.0.chat_id, chat_id);

        let turns = store.stored_turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Model);
        assert!(turns[0].created_at < turns[1].created_at);
    }

    #[tokio::test]
    async fn creates_a_chat_with_placeholder_title_when_no_id_is_given() {
        let store = Arc::new(MemoryStore::default());
        let state = app_state(store.clone(), Some("hello!"), ScriptedTitle(None));
        let user_id = Uuid::new_v4();

        let response = chat_handler(
            State(state),
            Extension(user_id),
            Json(request(vec![wire_turn("user", "hi")], None)),
        )
        .await
        .unwrap();

        assert_eq!(store.title_of(response.0.chat_id).as_deref(), Some(PLACEHOLDER_TITLE));
    }

    #[tokio::test]
    async fn failed_synthesis_keeps_the_user_turn_and_writes_no_model_turn() {
        let store = Arc::new(MemoryStore::default());
        let state = app_state(store.clone(), None, ScriptedTitle(None));
        let user_id = Uuid::new_v4();
        let chat_id = store.seed_chat(user_id);

        let result = chat_handler(
            State(state),
            Extension(user_id),
            Json(request(
                vec![wire_turn("user", "explain linked lists")],
                Some(chat_id),
            )),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Gateway(_))));
        let turns = store.stored_turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[tokio::test]
    async fn empty_history_is_a_validation_error() {
        let store = Arc::new(MemoryStore::default());
        let state = app_state(store.clone(), Some("unused"), ScriptedTitle(None));

        let result = chat_handler(
            State(state),
            Extension(Uuid::new_v4()),
            Json(request(vec![], None)),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(store.stored_turns().is_empty());
    }

    #[tokio::test]
    async fn trailing_model_turn_is_a_validation_error() {
        let store = Arc::new(MemoryStore::default());
        let state = app_state(store.clone(), Some("unused"), ScriptedTitle(None));

        let result = chat_handler(
            State(state),
            Extension(Uuid::new_v4()),
            Json(request(
                vec![wire_turn("user", "hi"), wire_turn("model", "hello")],
                None,
            )),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_chat_id_is_not_found_and_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let state = app_state(store.clone(), Some("unused"), ScriptedTitle(None));

        let result = chat_handler(
            State(state),
            Extension(Uuid::new_v4()),
            Json(request(vec![wire_turn("user", "hi")], Some(Uuid::new_v4()))),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Store(StoreError::NotFound(_)))));
        assert!(store.stored_turns().is_empty());
    }

    #[tokio::test]
    async fn another_users_chat_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let state = app_state(store.clone(), Some("unused"), ScriptedTitle(None));
        let owner = Uuid::new_v4();
        let chat_id = store.seed_chat(owner);

        let result = chat_handler(
            State(state),
            Extension(Uuid::new_v4()),
            Json(request(vec![wire_turn("user", "hi")], Some(chat_id))),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Store(StoreError::NotFound(_)))));
    }
}
