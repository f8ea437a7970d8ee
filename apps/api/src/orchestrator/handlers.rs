//! HTTP handlers for the session lifecycle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

use super::session::SessionStatus;
use super::LaunchRequest;

/// POST /api/v1/sessions
pub async fn handle_launch(
    State(state): State<AppState>,
    Json(request): Json<LaunchRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let session_id = state.orchestrator.launch(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "session_id": session_id })),
    ))
}

/// GET /api/v1/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let sessions = state.orchestrator.list().await;
    Ok(Json(json!({ "sessions": sessions })))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, AppError> {
    let status = state.orchestrator.status(id).await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub value: String,
}

/// POST /api/v1/sessions/:id/intervention
pub async fn handle_resolve_intervention(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.orchestrator.resolve_intervention(id, request.value).await?;
    Ok(Json(json!({ "status": "resolved" })))
}

/// POST /api/v1/sessions/:id/abort
pub async fn handle_abort_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.orchestrator.abort(id).await?;
    Ok(Json(json!({ "status": "aborted" })))
}
