//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses. Every user-visible failure is a short, friendly
//! message in a `{ "error": ... }` JSON body; provider payloads and stack
//! traces never reach a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use converse_core::ports::{GatewayError, StoreError};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The JSON body returned for every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required request field was missing or invalid.
    #[error("{0}")]
    Validation(String),

    /// The bearer token was missing or invalid.
    #[error("{0}")]
    Unauthorized(String),

    /// The requested resource does not exist (or belongs to another user).
    #[error("{0}")]
    NotFound(String),

    /// The final model call failed; the only upstream failure that surfaces.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Represents an error that propagated up from the persistence port.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Gateway(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Store(StoreError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Store(_) | ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A storage error occurred. Please try again.".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred.".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
