//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the chat CRUD endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use converse_core::domain::Turn;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::chat::chat_handler,
        list_chats_handler,
        list_messages_handler,
        rename_chat_handler,
        delete_chat_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            crate::web::protocol::ChatRequest,
            crate::web::protocol::ChatResponse,
            crate::web::protocol::WireTurn,
            crate::web::protocol::WirePart,
            crate::web::protocol::WireInstruction,
            ChatListEntry,
            MessageResponse,
            TitleResponse,
            DeleteResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Converse API", description = "API endpoints for the conversational chat service.")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One chat in the sidebar listing.
#[derive(Serialize, ToSchema)]
pub struct ChatListEntry {
    pub id: Uuid,
    pub title: String,
}

/// One persisted message of a chat.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: String,
    pub text: String,
}

/// The payload returned after a successful rename.
#[derive(Serialize, ToSchema)]
pub struct TitleResponse {
    pub title: String,
}

/// The payload returned after deleting a chat.
#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the user's chats, newest first.
#[utoipa::path(
    get,
    path = "/chats",
    responses(
        (status = 200, description = "Chats listed", body = [ChatListEntry]),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_chats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let chats = state.chats.list_chats(user_id).await.map_err(|e| {
        error!("Failed to list chats: {:?}", e);
        ApiError::Store(e)
    })?;

    let entries: Vec<ChatListEntry> = chats
        .into_iter()
        .map(|chat| ChatListEntry {
            id: chat.id,
            title: chat.title,
        })
        .collect();
    Ok(Json(entries))
}

/// List the messages of one chat in conversational order.
#[utoipa::path(
    get,
    path = "/chats/{chat_id}/messages",
    params(
        ("chat_id" = Uuid, Path, description = "The chat to load.")
    ),
    responses(
        (status = 200, description = "Messages listed", body = [MessageResponse]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Chat not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let turns = state.chats.list_turns(user_id, chat_id).await?;

    let messages: Vec<MessageResponse> = turns
        .into_iter()
        .map(|turn| MessageResponse {
            id: turn.id,
            role: turn.role.as_str().to_string(),
            text: turn.text,
        })
        .collect();
    Ok(Json(messages))
}

/// Generate and persist a short title for the chat.
#[utoipa::path(
    post,
    path = "/chats/{chat_id}/rename",
    params(
        ("chat_id" = Uuid, Path, description = "The chat to rename.")
    ),
    responses(
        (status = 200, description = "Title generated", body = TitleResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Chat not found"),
        (status = 502, description = "Title generation failed")
    ),
    security(("bearer_token" = []))
)]
pub async fn rename_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let turns = state.chats.list_turns(user_id, chat_id).await?;
    if turns.is_empty() {
        return Err(ApiError::Validation(
            "Cannot generate a title for an empty chat.".to_string(),
        ));
    }

    let history: Vec<Turn> = turns
        .into_iter()
        .map(|turn| Turn {
            role: turn.role,
            text: turn.text,
        })
        .collect();

    // A failed generation surfaces as an error and leaves the current
    // title in place.
    let title = state.titles.generate(&history).await.map_err(|e| {
        error!("Title generation failed for chat {}: {}", chat_id, e);
        ApiError::Gateway(e)
    })?;

    state.chats.rename_chat(user_id, chat_id, &title).await?;
    info!("Renamed chat {} to '{}'", chat_id, title);

    Ok(Json(TitleResponse { title }))
}

/// Delete a chat and all of its messages.
#[utoipa::path(
    delete,
    path = "/chats/{chat_id}",
    params(
        ("chat_id" = Uuid, Path, description = "The chat to delete.")
    ),
    responses(
        (status = 200, description = "Chat deleted", body = DeleteResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Chat not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn delete_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.chats.delete_chat(user_id, chat_id).await?;
    info!("Deleted chat {}", chat_id);
    Ok(Json(DeleteResponse { success: true }))
}
