mod analysis;
mod browser;
mod config;
mod db;
mod errors;
mod executor;
mod fetcher;
mod inspect;
mod jobs;
mod llm_client;
mod orchestrator;
mod profile;
mod render;
mod routes;
mod state;
#[cfg(test)]
mod testing;
mod vault;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::ResumeTailor;
use crate::browser::webdriver::WebDriverFactory;
use crate::config::Config;
use crate::db::{create_pool, init_schema};
use crate::fetcher::HttpJobSource;
use crate::inspect::PageInspector;
use crate::llm_client::OllamaClient;
use crate::orchestrator::{Orchestrator, RuntimeParams, WorkerDeps};
use crate::profile::ProfileStore;
use crate::render::PlainTextRenderer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::vault::CredentialVault;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Emissary API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite
    let db = create_pool(&config.database_url).await?;
    init_schema(&db).await?;

    // The deployment cannot apply anywhere without its credential; mint it
    // now and fail fast if storage is broken.
    let vault = CredentialVault::new(db.clone());
    vault.get_or_create().await?;

    let profiles = ProfileStore::new(db.clone());

    // Initialize the model client
    let ollama = Arc::new(OllamaClient::new(
        config.ollama_base_url.clone(),
        config.text_model.clone(),
        config.vision_model.clone(),
    ));
    info!(
        "Model client initialized (text: {}, vision: {})",
        config.text_model, config.vision_model
    );

    let deps = WorkerDeps {
        pool: db.clone(),
        profiles: profiles.clone(),
        vault: vault.clone(),
        tailor: ResumeTailor::new(ollama.clone()),
        inspector: PageInspector::new(ollama),
        job_source: Arc::new(HttpJobSource::new()),
        driver_factory: Arc::new(WebDriverFactory::new(&config.webdriver_url)),
        renderer: Arc::new(PlainTextRenderer),
        params: RuntimeParams::default(),
    };
    let orchestrator = Arc::new(Orchestrator::new(deps));

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        orchestrator,
        vault,
        profiles,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
