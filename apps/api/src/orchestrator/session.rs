//! Session state machine and bookkeeping.
//!
//! `ApplicationSession` is the single mutable record for one application
//! attempt. All mutation happens behind the handle's mutex in `runner` and
//! the API handlers; this module only defines the legal shapes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::analysis::TailoredResume;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Tailoring,
    Navigating,
    Inspecting,
    Acting,
    Paused,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Tailoring => "tailoring",
            SessionState::Navigating => "navigating",
            SessionState::Inspecting => "inspecting",
            SessionState::Acting => "acting",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        }
    }

    /// Legal transitions. Anything not listed is a bug in the caller, not a
    /// recoverable condition.
    fn successors(&self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Idle => &[Tailoring, Failed],
            Tailoring => &[Navigating, Failed],
            Navigating => &[Inspecting, Failed],
            Inspecting => &[Acting, Paused, Failed],
            Acting => &[Inspecting, Completed, Failed],
            Paused => &[Inspecting, Failed],
            Completed | Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        self.successors().contains(&next)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Captcha,
    MissingField,
    UnknownLayout,
    InspectionFailure,
}

/// An open request for a human to unblock the session. At most one exists
/// per session at a time.
pub struct InterventionRequest {
    pub prompt: String,
    pub kind: InterventionKind,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub value: Option<String>,
    /// Consumed when the request is resolved; wakes the suspended worker.
    pub responder: Option<oneshot::Sender<String>>,
}

impl InterventionRequest {
    pub fn new(prompt: String, kind: InterventionKind, responder: oneshot::Sender<String>) -> Self {
        Self {
            prompt,
            kind,
            created_at: Utc::now(),
            resolved: false,
            value: None,
            responder: Some(responder),
        }
    }
}

pub struct ApplicationSession {
    pub id: Uuid,
    pub job_url: String,
    /// Set when the session was claimed from the job queue.
    pub queue_id: Option<i64>,
    pub state: SessionState,
    pub step_index: usize,
    pub tailored: Option<TailoredResume>,
    pub last_observation: Option<String>,
    pub intervention: Option<InterventionRequest>,
    pub failure: Option<String>,
    pub history: Vec<SessionState>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ApplicationSession {
    pub fn new(id: Uuid, job_url: String, queue_id: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            id,
            job_url,
            queue_id,
            state: SessionState::Idle,
            step_index: 0,
            tailored: None,
            last_observation: None,
            intervention: None,
            failure: None,
            history: vec![SessionState::Idle],
            created_at: now,
            last_activity: now,
        }
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        self.touch();
        Ok(())
    }

    /// Moves the session to Failed with a reason. Any open intervention is
    /// dropped; its responder disconnects, which a waiting worker observes.
    pub fn fail(&mut self, reason: &str) -> Result<(), TransitionError> {
        self.transition(SessionState::Failed)?;
        self.failure = Some(reason.to_string());
        self.intervention = None;
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id,
            job_url: self.job_url.clone(),
            state: self.state,
            step_index: self.step_index,
            last_observation: self.last_observation.clone(),
            pending_prompt: self
                .intervention
                .as_ref()
                .filter(|req| !req.resolved)
                .map(|req| req.prompt.clone()),
            failure: self.failure.clone(),
            tailored_resume: self.tailored.clone(),
            history: self.history.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Snapshot returned by the status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub job_url: String,
    pub state: SessionState,
    pub step_index: usize,
    pub last_observation: Option<String>,
    pub pending_prompt: Option<String>,
    pub failure: Option<String>,
    pub tailored_resume: Option<TailoredResume>,
    pub history: Vec<SessionState>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
