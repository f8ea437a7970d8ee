//! Session orchestration.
//!
//! The orchestrator owns every live `ApplicationSession`: it launches worker
//! tasks, serves status snapshots, routes operator intervention values to
//! suspended workers, and aborts sessions on request. One worker task per
//! session; all shared mutation goes through the session mutex inside each
//! handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::analysis::ResumeTailor;
use crate::browser::DriverFactory;
use crate::errors::AppError;
use crate::fetcher::JobSource;
use crate::inspect::PageInspector;
use crate::jobs;
use crate::profile::ProfileStore;
use crate::render::ResumeRenderer;
use crate::vault::CredentialVault;

pub mod handlers;
mod runner;
pub mod session;

use session::{ApplicationSession, SessionStatus};

/// One live session: the mutable record plus the abort signal its worker
/// listens on.
pub struct SessionHandle {
    session: Mutex<ApplicationSession>,
    abort: watch::Sender<bool>,
}

/// Retry budgets and delays for the worker loop. Tests swap in zero delays;
/// production uses the defaults.
#[derive(Debug, Clone)]
pub struct RuntimeParams {
    /// Page re-observations before a missing-field or unknown-layout verdict
    /// escalates to a pause.
    pub observation_retries: u32,
    /// Vision call failures tolerated before pausing for a human.
    pub inspection_retries: u32,
    /// Extra confirmation checks after submission before giving up.
    pub confirm_retries: u32,
    pub retry_delay: Duration,
    /// Wait after navigation or a form action, for the page to settle.
    pub settle_delay: Duration,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            observation_retries: 2,
            inspection_retries: 2,
            confirm_retries: 2,
            retry_delay: Duration::from_secs(2),
            settle_delay: Duration::from_secs(3),
        }
    }
}

impl RuntimeParams {
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Everything a worker task needs, shared across all sessions.
pub struct WorkerDeps {
    pub pool: SqlitePool,
    pub profiles: ProfileStore,
    pub vault: CredentialVault,
    pub tailor: ResumeTailor,
    pub inspector: PageInspector,
    pub job_source: Arc<dyn JobSource>,
    pub driver_factory: Arc<dyn DriverFactory>,
    pub renderer: Arc<dyn ResumeRenderer>,
    pub params: RuntimeParams,
}

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub job_url: String,
    /// Posting text supplied by the caller; skips fetching the URL.
    #[serde(default)]
    pub job_text: Option<String>,
}

pub struct Orchestrator {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    deps: Arc<WorkerDeps>,
}

impl Orchestrator {
    pub fn new(deps: WorkerDeps) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            deps: Arc::new(deps),
        }
    }

    /// Starts a new application session. Returns as soon as the worker task
    /// is spawned; progress is observable through `status`.
    pub async fn launch(&self, request: LaunchRequest) -> Result<Uuid, AppError> {
        let url = request.job_url.trim().to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "job_url must be an http(s) URL".to_string(),
            ));
        }

        Ok(self.spawn_session(url, None, request.job_text).await)
    }

    /// Claims the oldest pending queue entry and starts a session for it.
    pub async fn claim_next_queued(&self) -> Result<(i64, Uuid), AppError> {
        let job = jobs::claim_next(&self.deps.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("no pending jobs in the queue".to_string()))?;

        let session_id = self.spawn_session(job.url, Some(job.id), None).await;
        jobs::update_status(
            &self.deps.pool,
            job.id,
            jobs::STATUS_IN_PROGRESS,
            &format!("claimed by session {session_id}"),
        )
        .await?;

        Ok((job.id, session_id))
    }

    async fn spawn_session(
        &self,
        job_url: String,
        queue_id: Option<i64>,
        job_text: Option<String>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let (abort, _) = watch::channel(false);
        let handle = Arc::new(SessionHandle {
            session: Mutex::new(ApplicationSession::new(id, job_url.clone(), queue_id)),
            abort,
        });

        self.sessions.write().await.insert(id, handle.clone());
        info!("Session {} launched for {}", id, job_url);

        tokio::spawn(runner::run(self.deps.clone(), handle, job_text));
        id
    }

    pub async fn status(&self, id: Uuid) -> Result<SessionStatus, AppError> {
        let handle = self.get(id).await?;
        let session = handle.session.lock().await;
        Ok(session.status())
    }

    pub async fn list(&self) -> Vec<SessionStatus> {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.read().await.values().cloned().collect();

        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            statuses.push(handle.session.lock().await.status());
        }
        statuses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        statuses
    }

    /// Delivers an operator-provided value to a paused session. Exactly one
    /// resolution wins; later calls surface `AlreadyResolved` until the
    /// worker consumes the request.
    pub async fn resolve_intervention(&self, id: Uuid, value: String) -> Result<(), AppError> {
        let handle = self.get(id).await?;
        let mut session = handle.session.lock().await;

        let request = session
            .intervention
            .as_mut()
            .ok_or(AppError::NoOpenIntervention(id))?;
        if request.resolved {
            return Err(AppError::AlreadyResolved(id));
        }

        request.resolved = true;
        request.value = Some(value.clone());
        if let Some(responder) = request.responder.take() {
            // The worker may have been aborted between pausing and this call;
            // a disconnected receiver is not an operator-visible error.
            let _ = responder.send(value);
        }
        session.touch();

        info!("Session {} intervention resolved", id);
        Ok(())
    }

    /// Fails a running session and signals its worker to stop. The worker
    /// quits the browser and archives the session on its way out.
    pub async fn abort(&self, id: Uuid) -> Result<(), AppError> {
        let handle = self.get(id).await?;
        {
            let mut session = handle.session.lock().await;
            if session.state.is_terminal() {
                return Err(AppError::TerminalSession(id));
            }
            let _ = session.fail("session aborted by operator");
        }

        let _ = handle.abort.send(true);
        info!("Session {} aborted by operator", id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Arc<SessionHandle>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AppError::SessionNotFound(id))
    }
}
