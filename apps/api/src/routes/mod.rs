pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::jobs::handlers as job_handlers;
use crate::orchestrator::handlers as session_handlers;
use crate::profile;
use crate::state::AppState;
use crate::vault;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session API
        .route(
            "/api/v1/sessions",
            post(session_handlers::handle_launch).get(session_handlers::handle_list_sessions),
        )
        .route("/api/v1/sessions/:id", get(session_handlers::handle_get_session))
        .route(
            "/api/v1/sessions/:id/intervention",
            post(session_handlers::handle_resolve_intervention),
        )
        .route(
            "/api/v1/sessions/:id/abort",
            post(session_handlers::handle_abort_session),
        )
        // Applicant profile API
        .route(
            "/api/v1/profile",
            put(profile::handle_put_profile).get(profile::handle_get_profile),
        )
        // Credential vault API
        .route("/api/v1/vault/surrogate", get(vault::handle_get_surrogate))
        // Job queue API
        .route(
            "/api/v1/jobs",
            post(job_handlers::handle_enqueue).get(job_handlers::handle_list_jobs),
        )
        .route("/api/v1/jobs/claim", post(job_handlers::handle_claim))
        .with_state(state)
}
