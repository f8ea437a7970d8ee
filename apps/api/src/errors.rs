#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No session with id {0}")]
    SessionNotFound(Uuid),

    #[error("Session {0} has no open intervention request")]
    NoOpenIntervention(Uuid),

    #[error("Intervention for session {0} was already resolved")]
    AlreadyResolved(Uuid),

    #[error("Session {0} has already finished")]
    TerminalSession(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                format!("No session with id {id}"),
            ),
            AppError::NoOpenIntervention(id) => (
                StatusCode::CONFLICT,
                "NO_OPEN_INTERVENTION",
                format!("Session {id} has no open intervention request"),
            ),
            AppError::AlreadyResolved(id) => (
                StatusCode::CONFLICT,
                "ALREADY_RESOLVED",
                format!("Intervention for session {id} was already resolved"),
            ),
            AppError::TerminalSession(id) => (
                StatusCode::CONFLICT,
                "TERMINAL_SESSION",
                format!("Session {id} has already finished"),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
