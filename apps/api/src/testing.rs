//! Shared test fixtures: an in-memory database, scripted model and browser
//! fakes, and a harness that wires them into a real `Orchestrator`.

use std::collections::VecDeque;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::analysis::ResumeTailor;
use crate::browser::{BrowserDriver, DriverError, DriverFactory};
use crate::fetcher::{FetchError, JobSource};
use crate::inspect::PageInspector;
use crate::llm_client::{ModelError, TextGenerator, VisionModel};
use crate::orchestrator::session::SessionStatus;
use crate::orchestrator::{Orchestrator, RuntimeParams, WorkerDeps};
use crate::profile::{ApplicantProfile, ProfileStore};
use crate::render::PlainTextRenderer;
use crate::vault::{CredentialVault, SurrogateCredential};

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

/// Fresh in-memory database with the full schema. One connection, because
/// every connection to `sqlite::memory:` sees its own database.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("in-memory DSN")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("in-memory pool");
    crate::db::init_schema(&pool).await.expect("schema init");
    pool
}

pub fn sample_profile() -> ApplicantProfile {
    ApplicantProfile {
        full_name: "Jordan Reyes".to_string(),
        email: "jordan.reyes@example.com".to_string(),
        phone: "+1-555-0142".to_string(),
        resume_text: "Led Rust services, built tokio pipelines, ran sqlite fleets".to_string(),
        gender: Some("prefer not to say".to_string()),
        race: None,
        veteran_status: Some("not a veteran".to_string()),
    }
}

pub fn sample_credential() -> SurrogateCredential {
    SurrogateCredential {
        password: "aB3!45cdefghijkl".to_string(),
        created_at: Utc::now(),
    }
}

pub fn ready_verdict() -> String {
    r#"{"status": "READY", "confidence": 0.95, "missing": [], "note": "form visible"}"#.to_string()
}

pub fn missing_verdict(fields: &[&str]) -> String {
    let names = fields
        .iter()
        .map(|f| format!("\"{f}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(r#"{{"status": "MISSING_FIELDS", "confidence": 0.9, "missing": [{names}]}}"#)
}

pub fn captcha_verdict() -> String {
    r#"{"status": "CAPTCHA", "confidence": 0.85}"#.to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Model fakes
// ─────────────────────────────────────────────────────────────────────────────

pub struct FakeText {
    mode: FakeTextMode,
}

enum FakeTextMode {
    TailoredOk,
    Unavailable,
    ReasoningOnly,
}

impl FakeText {
    pub fn ok() -> Self {
        Self {
            mode: FakeTextMode::TailoredOk,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            mode: FakeTextMode::Unavailable,
        }
    }

    pub fn reasoning_only() -> Self {
        Self {
            mode: FakeTextMode::ReasoningOnly,
        }
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        match self.mode {
            FakeTextMode::TailoredOk => Ok(
                "<think>aligning keywords</think>\n- Led Rust services matching the posting's stack"
                    .to_string(),
            ),
            FakeTextMode::Unavailable => Err(ModelError::Unavailable { retries: 3 }),
            FakeTextMode::ReasoningOnly => Ok("<think>nothing but scratchpad</think>".to_string()),
        }
    }
}

/// Scripted vision model. Classify prompts consume `verdicts` in order and
/// fall back to a READY verdict; confirmation prompts consume
/// `confirmations` and fall back to "SUBMITTED: YES".
pub struct FakeVision {
    verdicts: Mutex<VecDeque<Result<String, ModelError>>>,
    confirmations: Mutex<VecDeque<Result<String, ModelError>>>,
    classify_calls: Arc<AtomicU32>,
}

impl FakeVision {
    pub fn new(
        verdicts: Vec<Result<String, ModelError>>,
        confirmations: Vec<Result<String, ModelError>>,
    ) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into_iter().collect()),
            confirmations: Mutex::new(confirmations.into_iter().collect()),
            classify_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn classify_calls(&self) -> Arc<AtomicU32> {
        self.classify_calls.clone()
    }
}

#[async_trait]
impl VisionModel for FakeVision {
    async fn complete_with_image(
        &self,
        prompt: &str,
        _image_png: &[u8],
    ) -> Result<String, ModelError> {
        if prompt.contains("SUBMITTED") {
            self.confirmations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("SUBMITTED: YES".to_string()))
        } else {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            self.verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ready_verdict()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Browser fakes
// ─────────────────────────────────────────────────────────────────────────────

/// Records every interaction and consumes scripted results. Empty scripts
/// mean everything succeeds.
pub struct FakeDriver {
    calls: Arc<Mutex<Vec<String>>>,
    interactions: Arc<Mutex<VecDeque<Result<(), DriverError>>>>,
    opens: Arc<Mutex<VecDeque<Result<(), DriverError>>>>,
    quit_flag: Arc<AtomicBool>,
}

impl FakeDriver {
    pub fn scripted_interactions(interactions: Vec<Result<(), DriverError>>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            interactions: Arc::new(Mutex::new(interactions.into_iter().collect())),
            opens: Arc::new(Mutex::new(VecDeque::new())),
            quit_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    fn next_interaction(&self) -> Result<(), DriverError> {
        self.interactions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn open(&self, url: &str) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(format!("open {url}"));
        self.opens.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn screenshot(&self) -> Result<Bytes, DriverError> {
        Ok(Bytes::from_static(b"fake-png-bytes"))
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        Ok(concat!(
            r#"<input name="full_name"><input type="email" name="email">"#,
            r#"<input type="tel" name="phone"><input type="file" name="resume">"#,
            r#"<input name="work_authorization">"#,
            r#"<button type="submit">Apply</button>"#
        )
        .to_string())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("fill {selector} = {value}"));
        self.next_interaction()
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(format!("click {selector}"));
        self.next_interaction()
    }

    async fn upload(&self, selector: &str, path: &Path) -> Result<(), DriverError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("upload {selector} <- {}", path.display()));
        self.next_interaction()
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.quit_flag.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out drivers that share the factory's call log, scripts, and quit
/// flag, so tests can assert on them after the worker exits.
pub struct FakeDriverFactory {
    calls: Arc<Mutex<Vec<String>>>,
    interactions: Arc<Mutex<VecDeque<Result<(), DriverError>>>>,
    opens: Arc<Mutex<VecDeque<Result<(), DriverError>>>>,
    quit_flag: Arc<AtomicBool>,
}

impl FakeDriverFactory {
    pub fn new(
        interactions: Vec<Result<(), DriverError>>,
        opens: Vec<Result<(), DriverError>>,
    ) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            interactions: Arc::new(Mutex::new(interactions.into_iter().collect())),
            opens: Arc::new(Mutex::new(opens.into_iter().collect())),
            quit_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        self.quit_flag.clone()
    }
}

#[async_trait]
impl DriverFactory for FakeDriverFactory {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        Ok(Box::new(FakeDriver {
            calls: self.calls.clone(),
            interactions: self.interactions.clone(),
            opens: self.opens.clone(),
            quit_flag: self.quit_flag.clone(),
        }))
    }
}

pub struct FakeJobSource {
    text: Option<String>,
}

impl FakeJobSource {
    pub fn ok(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl JobSource for FakeJobSource {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub pool: SqlitePool,
    pub driver_calls: Arc<Mutex<Vec<String>>>,
    quit_flag: Arc<AtomicBool>,
    classify_calls: Arc<AtomicU32>,
}

impl Harness {
    pub fn driver_quit(&self) -> bool {
        self.quit_flag.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> u32 {
        self.classify_calls.load(Ordering::SeqCst)
    }
}

pub struct HarnessBuilder {
    text: FakeText,
    verdicts: Vec<Result<String, ModelError>>,
    confirmations: Vec<Result<String, ModelError>>,
    interactions: Vec<Result<(), DriverError>>,
    opens: Vec<Result<(), DriverError>>,
    fetch_ok: bool,
    with_profile: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            text: FakeText::ok(),
            verdicts: Vec::new(),
            confirmations: Vec::new(),
            interactions: Vec::new(),
            opens: Vec::new(),
            fetch_ok: true,
            with_profile: true,
        }
    }

    pub fn text(mut self, text: FakeText) -> Self {
        self.text = text;
        self
    }

    pub fn push_verdict(mut self, raw: &str) -> Self {
        self.verdicts.push(Ok(raw.to_string()));
        self
    }

    pub fn push_verdict_err(mut self, error: ModelError) -> Self {
        self.verdicts.push(Err(error));
        self
    }

    pub fn push_confirmation(mut self, raw: &str) -> Self {
        self.confirmations.push(Ok(raw.to_string()));
        self
    }

    pub fn push_interaction(mut self, result: Result<(), DriverError>) -> Self {
        self.interactions.push(result);
        self
    }

    pub fn push_open(mut self, result: Result<(), DriverError>) -> Self {
        self.opens.push(result);
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fetch_ok = false;
        self
    }

    pub fn without_profile(mut self) -> Self {
        self.with_profile = false;
        self
    }

    pub async fn build(self) -> Harness {
        let pool = memory_pool().await;

        let profiles = ProfileStore::new(pool.clone());
        if self.with_profile {
            profiles.save(&sample_profile()).await.expect("save profile");
        }

        let vision = Arc::new(FakeVision::new(self.verdicts, self.confirmations));
        let classify_calls = vision.classify_calls();

        let factory = Arc::new(FakeDriverFactory::new(self.interactions, self.opens));
        let driver_calls = factory.calls();
        let quit_flag = factory.quit_flag();

        let job_source: Arc<dyn JobSource> = if self.fetch_ok {
            Arc::new(FakeJobSource::ok(
                "Rust engineer posting seeking tokio and sqlite experience",
            ))
        } else {
            Arc::new(FakeJobSource::failing())
        };

        let deps = WorkerDeps {
            pool: pool.clone(),
            profiles,
            vault: CredentialVault::new(pool.clone()),
            tailor: ResumeTailor::new(Arc::new(self.text)),
            inspector: PageInspector::new(vision),
            job_source,
            driver_factory: factory,
            renderer: Arc::new(PlainTextRenderer),
            params: RuntimeParams::immediate(),
        };

        Harness {
            orchestrator: Arc::new(Orchestrator::new(deps)),
            pool,
            driver_calls,
            quit_flag,
            classify_calls,
        }
    }
}

/// Polls a session's status until the predicate holds, panicking with the
/// last snapshot after two seconds.
pub async fn wait_until<F>(orchestrator: &Orchestrator, id: Uuid, predicate: F) -> SessionStatus
where
    F: Fn(&SessionStatus) -> bool,
{
    for _ in 0..200 {
        let status = orchestrator.status(id).await.expect("session exists");
        if predicate(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let status = orchestrator.status(id).await.expect("session exists");
    panic!(
        "condition never held; state={:?} failure={:?} prompt={:?}",
        status.state, status.failure, status.pending_prompt
    );
}
