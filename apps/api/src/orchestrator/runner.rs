//! The per-session worker task.
//!
//! Flow: tailor the resume, launch a browser, navigate to the posting, then
//! loop observe -> decide -> act until the plan is exhausted and the final
//! page confirms submission. Pauses suspend the loop on a oneshot until an
//! operator resolves the intervention; the abort signal can interrupt any
//! long await. Whatever happens, `finalize` quits the browser, archives the
//! session, and settles the queue row.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::JobDescription;
use crate::browser::{dom, BrowserDriver, DriverError};
use crate::executor::{apply_step, decide, default_plan, Directive, StepOutcome};
use crate::inspect::PageState;
use crate::jobs;

use super::session::{InterventionKind, InterventionRequest, SessionState, SessionStatus};
use super::{SessionHandle, WorkerDeps};

pub(super) async fn run(
    deps: Arc<WorkerDeps>,
    handle: Arc<SessionHandle>,
    inline_job_text: Option<String>,
) {
    let driver = apply(&deps, &handle, inline_job_text).await;
    finalize(&deps, &handle, driver).await;
}

/// Runs the session up to a terminal outcome. Returns the browser handle if
/// one was launched so `finalize` can quit it.
async fn apply(
    deps: &WorkerDeps,
    handle: &SessionHandle,
    inline_job_text: Option<String>,
) -> Option<Box<dyn BrowserDriver>> {
    let mut abort_rx = handle.abort.subscribe();

    // Step 1: Tailoring. Gather inputs and rewrite the resume.
    let (session_id, job_url) = {
        let mut session = handle.session.lock().await;
        if session.transition(SessionState::Tailoring).is_err() {
            return None;
        }
        (session.id, session.job_url.clone())
    };
    info!("Session {}: tailoring resume for {}", session_id, job_url);

    let job_text = match inline_job_text {
        Some(text) => text,
        None => match with_abort(&mut abort_rx, deps.job_source.fetch_text(&job_url)).await {
            None => return None,
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                fail(handle, &format!("job fetch failed: {e}")).await;
                return None;
            }
        },
    };

    let profile = match deps.profiles.load().await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            fail(
                handle,
                "no applicant profile saved; save one before launching sessions",
            )
            .await;
            return None;
        }
        Err(e) => {
            fail(handle, &format!("profile load failed: {e}")).await;
            return None;
        }
    };

    let credential = match deps.vault.get_or_create().await {
        Ok(credential) => credential,
        Err(e) => {
            fail(handle, &format!("credential vault unavailable: {e}")).await;
            return None;
        }
    };

    let job = JobDescription {
        url: job_url.clone(),
        text: job_text,
    };
    let tailored = match with_abort(&mut abort_rx, deps.tailor.tailor(&job, &profile.resume_text))
        .await
    {
        None => return None,
        Some(Ok(tailored)) => tailored,
        Some(Err(e)) => {
            fail(handle, &format!("analysis failed: {e}")).await;
            return None;
        }
    };
    {
        let mut session = handle.session.lock().await;
        session.tailored = Some(tailored.clone());
    }

    // Step 2: Navigating. Launch the browser and open the posting.
    if !transition(handle, SessionState::Navigating).await {
        return None;
    }

    let driver = match with_abort(&mut abort_rx, deps.driver_factory.launch()).await {
        None => return None,
        Some(Ok(driver)) => driver,
        Some(Err(e)) => {
            fail(handle, &format!("browser launch failed: {e}")).await;
            return None;
        }
    };

    match with_abort(&mut abort_rx, open_with_retry(driver.as_ref(), &job_url)).await {
        None => return Some(driver),
        Some(Ok(())) => {}
        Some(Err(e)) => {
            fail(handle, &format!("navigation failed: {e}")).await;
            return Some(driver);
        }
    }
    sleep(deps.params.settle_delay).await;

    let artifact = match deps.renderer.render(&tailored) {
        Ok(artifact) => artifact,
        Err(e) => {
            fail(handle, &format!("resume rendering failed: {e}")).await;
            return Some(driver);
        }
    };
    let mut plan = default_plan(&profile, &credential, artifact.path().to_path_buf());

    // Step 3: the observe -> decide -> act loop.
    let mut observation_attempt: u32 = 0;
    let mut inspection_failures: u32 = 0;

    loop {
        if !enter_inspecting(handle).await {
            return Some(driver);
        }

        let screenshot = match with_abort(&mut abort_rx, driver.screenshot()).await {
            None => return Some(driver),
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                fail(handle, &format!("screenshot failed: {e}")).await;
                return Some(driver);
            }
        };

        let digest = match with_abort(&mut abort_rx, driver.page_source()).await {
            None => return Some(driver),
            Some(Ok(html)) => dom::compress(&html),
            Some(Err(e)) => {
                fail(handle, &format!("page source read failed: {e}")).await;
                return Some(driver);
            }
        };

        let expected = plan.expected_fields();
        let observation = match with_abort(
            &mut abort_rx,
            deps.inspector.classify(&screenshot, &expected, &digest),
        )
        .await
        {
            None => return Some(driver),
            Some(Ok(observation)) => {
                inspection_failures = 0;
                observation
            }
            Some(Err(e)) => {
                inspection_failures += 1;
                warn!(
                    "Session {}: inspection failed ({}/{}): {}",
                    session_id,
                    inspection_failures,
                    deps.params.inspection_retries + 1,
                    e
                );
                if inspection_failures <= deps.params.inspection_retries {
                    sleep(deps.params.retry_delay).await;
                    continue;
                }
                inspection_failures = 0;
                let prompt = "Automatic page inspection keeps failing. Check the live browser \
                              session and advance the page manually, then submit any value \
                              here to continue."
                    .to_string();
                match pause(handle, &mut abort_rx, prompt, InterventionKind::InspectionFailure)
                    .await
                {
                    None => return Some(driver),
                    Some(_) => continue,
                }
            }
        };

        {
            let mut session = handle.session.lock().await;
            session.last_observation = Some(observation.summary());
            session.touch();
        }

        match decide(&observation, observation_attempt, deps.params.observation_retries) {
            Directive::Proceed => {
                observation_attempt = 0;
                if !transition(handle, SessionState::Acting).await {
                    return Some(driver);
                }

                let step = match plan.current() {
                    Some(step) => step.clone(),
                    None => {
                        confirm_and_finish(deps, handle, &mut abort_rx, driver.as_ref(), session_id)
                            .await;
                        return Some(driver);
                    }
                };

                let result = match with_abort(&mut abort_rx, apply_step(driver.as_ref(), &step))
                    .await
                {
                    None => return Some(driver),
                    Some(result) => result,
                };

                match result {
                    Ok(outcome) => {
                        plan.advance();
                        {
                            let mut session = handle.session.lock().await;
                            session.step_index = plan.cursor();
                            session.touch();
                        }
                        match outcome {
                            StepOutcome::Applied => {
                                info!("Session {}: {}", session_id, step.describe())
                            }
                            StepOutcome::SkippedOptional => info!(
                                "Session {}: skipped optional step '{}'",
                                session_id,
                                step.field().label
                            ),
                        }

                        if plan.is_exhausted() {
                            confirm_and_finish(
                                deps,
                                handle,
                                &mut abort_rx,
                                driver.as_ref(),
                                session_id,
                            )
                            .await;
                            return Some(driver);
                        }
                        sleep(deps.params.settle_delay).await;
                    }
                    Err(e) => {
                        fail(
                            handle,
                            &format!("browser step '{}' failed: {e}", step.field().label),
                        )
                        .await;
                        return Some(driver);
                    }
                }
            }
            Directive::Retry => {
                observation_attempt += 1;
                debug!(
                    "Session {}: re-observing ({}/{})",
                    session_id, observation_attempt, deps.params.observation_retries
                );
                sleep(deps.params.retry_delay).await;
            }
            Directive::Pause { prompt } => {
                observation_attempt = 0;
                let kind = match observation.state {
                    PageState::Captcha => InterventionKind::Captcha,
                    PageState::MissingField => InterventionKind::MissingField,
                    _ => InterventionKind::UnknownLayout,
                };
                let resolution = match pause(handle, &mut abort_rx, prompt, kind).await {
                    None => return Some(driver),
                    Some(value) => value,
                };

                // A single named missing field plus an operator value is an
                // instruction to type it in before re-observing.
                if kind == InterventionKind::MissingField && observation.missing_fields.len() == 1
                {
                    fill_from_resolution(
                        handle,
                        driver.as_ref(),
                        &observation.missing_fields[0],
                        &resolution,
                        session_id,
                    )
                    .await;
                }
            }
        }
    }
}

/// Suspends the session until an operator resolves the intervention or the
/// session is aborted. No locks are held while waiting, so status and
/// resolution endpoints stay fully live.
async fn pause(
    handle: &SessionHandle,
    abort_rx: &mut watch::Receiver<bool>,
    prompt: String,
    kind: InterventionKind,
) -> Option<String> {
    let (responder, resolution) = oneshot::channel();
    {
        let mut session = handle.session.lock().await;
        if session.transition(SessionState::Paused).is_err() {
            return None;
        }
        info!("Session {} paused: {}", session.id, prompt);
        session.intervention = Some(InterventionRequest::new(prompt, kind, responder));
    }

    let value = tokio::select! {
        _ = abort_rx.wait_for(|aborted| *aborted) => None,
        value = resolution => value.ok(),
    };

    let mut session = handle.session.lock().await;
    session.intervention = None;
    session.touch();
    value
}

async fn fill_from_resolution(
    handle: &SessionHandle,
    driver: &dyn BrowserDriver,
    field_name: &str,
    value: &str,
    session_id: Uuid,
) {
    if value.trim().is_empty() {
        return;
    }
    let token = field_name
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();
    if token.is_empty() {
        return;
    }

    let selector = format!(
        "input[name*='{token}' i], input[id*='{token}' i], \
         input[aria-label*='{token}' i], input[placeholder*='{token}' i]"
    );
    match driver.fill(&selector, value).await {
        Ok(()) => info!(
            "Session {}: filled '{}' from the intervention value",
            session_id, field_name
        ),
        Err(e) => {
            warn!(
                "Session {}: could not fill '{}' from the intervention value: {}",
                session_id, field_name, e
            );
            let mut session = handle.session.lock().await;
            session.last_observation = Some(format!(
                "operator value for '{field_name}' could not be applied: {e}"
            ));
        }
    }
}

/// After the last plan step, re-checks the page until it confirms the
/// application was received.
async fn confirm_and_finish(
    deps: &WorkerDeps,
    handle: &SessionHandle,
    abort_rx: &mut watch::Receiver<bool>,
    driver: &dyn BrowserDriver,
    session_id: Uuid,
) {
    for attempt in 0..=deps.params.confirm_retries {
        if attempt > 0 {
            sleep(deps.params.retry_delay).await;
        }

        let screenshot = match with_abort(abort_rx, driver.screenshot()).await {
            None => return,
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                fail(handle, &format!("post-submission screenshot failed: {e}")).await;
                return;
            }
        };

        match with_abort(abort_rx, deps.inspector.confirm_submission(&screenshot)).await {
            None => return,
            Some(Ok(true)) => {
                if transition(handle, SessionState::Completed).await {
                    info!("Session {}: application submitted", session_id);
                }
                return;
            }
            Some(Ok(false)) => debug!(
                "Session {}: confirmation not visible yet ({}/{})",
                session_id,
                attempt + 1,
                deps.params.confirm_retries + 1
            ),
            Some(Err(e)) => warn!("Session {}: confirmation check failed: {}", session_id, e),
        }
    }

    fail(handle, "submission not confirmed by the final page").await;
}

/// Runs on every worker exit path: quits the browser, archives the session,
/// and settles the queue row it was claimed from.
async fn finalize(
    deps: &WorkerDeps,
    handle: &SessionHandle,
    driver: Option<Box<dyn BrowserDriver>>,
) {
    if let Some(driver) = driver {
        if let Err(e) = driver.quit().await {
            warn!("Browser session cleanup failed: {}", e);
        }
    }

    let (record, queue_id) = {
        let mut session = handle.session.lock().await;
        if !session.state.is_terminal() {
            let _ = session.fail("worker exited unexpectedly");
        }
        (session.status(), session.queue_id)
    };

    archive(deps, &record).await;

    if let Some(queue_id) = queue_id {
        let (status, log) = if record.state == SessionState::Completed {
            (jobs::STATUS_SUCCESS, "application submitted".to_string())
        } else {
            (
                jobs::STATUS_FAILED,
                record
                    .failure
                    .clone()
                    .unwrap_or_else(|| "session failed".to_string()),
            )
        };
        if let Err(e) = jobs::update_status(&deps.pool, queue_id, status, &log).await {
            warn!("Queue row {} could not be settled: {}", queue_id, e);
        }
    }
}

async fn archive(deps: &WorkerDeps, record: &SessionStatus) {
    let history = serde_json::to_string(&record.history).unwrap_or_else(|_| "[]".to_string());
    let result = sqlx::query(
        r#"
        INSERT OR REPLACE INTO session_archive
            (session_id, job_url, final_state, failure, history, created_at, finished_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.job_url)
    .bind(record.state.as_str())
    .bind(&record.failure)
    .bind(history)
    .bind(record.created_at)
    .bind(Utc::now())
    .execute(&deps.pool)
    .await;

    if let Err(e) = result {
        warn!("Session {} could not be archived: {}", record.id, e);
    }
}

async fn open_with_retry(driver: &dyn BrowserDriver, url: &str) -> Result<(), DriverError> {
    match driver.open(url).await {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!("Navigation to {} failed once, retrying: {}", url, first);
            driver.open(url).await
        }
    }
}

async fn transition(handle: &SessionHandle, next: SessionState) -> bool {
    let mut session = handle.session.lock().await;
    session.transition(next).is_ok()
}

/// Enters Inspecting from wherever the loop is. A no-op when already there,
/// so retried observations do not push duplicate history entries.
async fn enter_inspecting(handle: &SessionHandle) -> bool {
    let mut session = handle.session.lock().await;
    if session.state == SessionState::Inspecting {
        return true;
    }
    session.transition(SessionState::Inspecting).is_ok()
}

async fn fail(handle: &SessionHandle, reason: &str) {
    let mut session = handle.session.lock().await;
    if session.state.is_terminal() {
        return;
    }
    error!("Session {} failed: {}", session.id, reason);
    let _ = session.fail(reason);
}

/// Runs a future to completion unless the abort signal fires first.
async fn with_abort<F, T>(abort_rx: &mut watch::Receiver<bool>, future: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        _ = abort_rx.wait_for(|aborted| *aborted) => None,
        value = future => Some(value),
    }
}
