//! Page inspection through the vision model.
//!
//! Every orchestrator step starts with a screenshot. The inspector turns it
//! into a `PageObservation`: is the form ready, is something missing, is a
//! CAPTCHA in the way, or is this page not recognizable as a form at all.
//! The model's verdict is advisory; `interpret_verdict` decides what the
//! state machine is allowed to act on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::llm_client::{parse_json, ModelError, VisionModel};

mod prompts;

/// Verdicts below this confidence are not acted on; the page is treated as
/// unrecognized instead.
pub const CONFIDENCE_FLOOR: f32 = 0.6;

#[derive(Debug, Error)]
pub enum InspectionError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Ready,
    MissingField,
    Captcha,
    UnknownLayout,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageObservation {
    pub state: PageState,
    pub confidence: f32,
    pub missing_fields: Vec<String>,
    pub note: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl PageObservation {
    fn new(state: PageState, confidence: f32) -> Self {
        Self {
            state,
            confidence,
            missing_fields: Vec::new(),
            note: None,
            captured_at: Utc::now(),
        }
    }

    /// One line for session logs and status endpoints.
    pub fn summary(&self) -> String {
        match self.state {
            PageState::Ready => format!("page ready (confidence {:.2})", self.confidence),
            PageState::MissingField => format!(
                "missing fields: {} (confidence {:.2})",
                self.missing_fields.join(", "),
                self.confidence
            ),
            PageState::Captcha => "CAPTCHA detected".to_string(),
            PageState::UnknownLayout => match &self.note {
                Some(note) => format!("layout not recognized: {note}"),
                None => "layout not recognized".to_string(),
            },
        }
    }
}

/// Shape the classify prompt asks the model to return.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    status: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    missing: Vec<String>,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Clone)]
pub struct PageInspector {
    vision: Arc<dyn VisionModel>,
}

impl PageInspector {
    pub fn new(vision: Arc<dyn VisionModel>) -> Self {
        Self { vision }
    }

    /// Classifies the current page against the fields the plan still needs.
    pub async fn classify(
        &self,
        screenshot: &[u8],
        expected_fields: &[String],
        dom_digest: &str,
    ) -> Result<PageObservation, InspectionError> {
        let prompt = prompts::classify_prompt(expected_fields, dom_digest);
        let raw = self.vision.complete_with_image(&prompt, screenshot).await?;
        Ok(interpret_verdict(&raw))
    }

    /// Checks whether a post-submission page confirms the application.
    pub async fn confirm_submission(&self, screenshot: &[u8]) -> Result<bool, InspectionError> {
        let prompt = prompts::confirm_prompt();
        let raw = self.vision.complete_with_image(&prompt, screenshot).await?;
        Ok(raw.to_uppercase().contains("SUBMITTED: YES"))
    }
}

/// Turns raw model output into an observation the state machine can trust.
fn interpret_verdict(raw: &str) -> PageObservation {
    if let Ok(verdict) = parse_json::<RawVerdict>(raw) {
        let confidence = verdict.confidence.clamp(0.0, 1.0);
        let state = match verdict.status.to_uppercase().as_str() {
            "READY" => PageState::Ready,
            "MISSING_FIELDS" => PageState::MissingField,
            "CAPTCHA" => PageState::Captcha,
            _ => PageState::UnknownLayout,
        };

        // Captcha is honored at any confidence; other verdicts below the
        // floor degrade to unknown layout.
        let state = if state != PageState::Captcha && confidence < CONFIDENCE_FLOOR {
            PageState::UnknownLayout
        } else {
            state
        };

        let mut observation = PageObservation::new(state, confidence);
        if state == PageState::MissingField {
            observation.missing_fields = verdict.missing;
        }
        observation.note = verdict.note;
        return observation;
    }

    // Sentinel fallback for models that ignore the JSON instruction.
    let upper = raw.to_uppercase();
    if upper.contains("CAPTCHA: YES") {
        return PageObservation::new(PageState::Captcha, 1.0);
    }
    if upper.contains("STATUS: OK") {
        return PageObservation::new(PageState::Ready, 1.0);
    }

    warn!("Unparseable vision verdict: {}", truncate(raw, 120));
    let mut observation = PageObservation::new(PageState::UnknownLayout, 0.0);
    observation.note = Some(truncate(raw, 120));
    observation
}

fn truncate(text: &str, max: usize) -> String {
    crate::fetcher::truncate_chars(text.trim(), max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_ready_verdict() {
        let raw = r#"{"status": "READY", "confidence": 0.9, "missing": [], "note": "form visible"}"#;
        let observation = interpret_verdict(raw);
        assert_eq!(observation.state, PageState::Ready);
        assert_eq!(observation.confidence, 0.9);
        assert_eq!(observation.note.as_deref(), Some("form visible"));
    }

    #[test]
    fn test_interpret_missing_fields_carries_names() {
        let raw = r#"{"status": "MISSING_FIELDS", "confidence": 0.8, "missing": ["resume", "phone"]}"#;
        let observation = interpret_verdict(raw);
        assert_eq!(observation.state, PageState::MissingField);
        assert_eq!(observation.missing_fields, vec!["resume", "phone"]);
    }

    #[test]
    fn test_interpret_low_confidence_degrades_to_unknown() {
        let raw = r#"{"status": "READY", "confidence": 0.3}"#;
        let observation = interpret_verdict(raw);
        assert_eq!(observation.state, PageState::UnknownLayout);
    }

    #[test]
    fn test_interpret_captcha_wins_even_at_low_confidence() {
        let raw = r#"{"status": "CAPTCHA", "confidence": 0.2}"#;
        let observation = interpret_verdict(raw);
        assert_eq!(observation.state, PageState::Captcha);
    }

    #[test]
    fn test_interpret_fenced_json_verdict() {
        let raw = "```json\n{\"status\": \"READY\", \"confidence\": 0.95}\n```";
        assert_eq!(interpret_verdict(raw).state, PageState::Ready);
    }

    #[test]
    fn test_interpret_sentinel_fallbacks() {
        assert_eq!(
            interpret_verdict("I looked carefully.\nCAPTCHA: YES").state,
            PageState::Captcha
        );
        assert_eq!(interpret_verdict("STATUS: OK").state, PageState::Ready);
    }

    #[test]
    fn test_interpret_garbage_is_unknown_layout() {
        let observation = interpret_verdict("the page seems nice");
        assert_eq!(observation.state, PageState::UnknownLayout);
        assert_eq!(observation.confidence, 0.0);
        assert!(observation.note.is_some());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let raw = r#"{"status": "READY", "confidence": 3.5}"#;
        assert_eq!(interpret_verdict(raw).confidence, 1.0);
    }
}
