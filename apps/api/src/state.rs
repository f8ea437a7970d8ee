use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::profile::ProfileStore;
use crate::vault::CredentialVault;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub vault: CredentialVault,
    pub profiles: ProfileStore,
}
