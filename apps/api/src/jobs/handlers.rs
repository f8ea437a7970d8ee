//! HTTP handlers for the job queue.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
}

/// POST /api/v1/jobs
pub async fn handle_enqueue(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let url = request.url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::Validation(
            "url must be an http(s) URL".to_string(),
        ));
    }

    let added = super::enqueue(
        &state.db,
        url,
        request.title.as_deref(),
        request.company.as_deref(),
    )
    .await?;

    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "added": added }))))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let jobs = super::list(&state.db).await?;
    Ok(Json(json!({ "jobs": jobs })))
}

/// POST /api/v1/jobs/claim
pub async fn handle_claim(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (job_id, session_id) = state.orchestrator.claim_next_queued().await?;
    Ok(Json(json!({ "job_id": job_id, "session_id": session_id })))
}
