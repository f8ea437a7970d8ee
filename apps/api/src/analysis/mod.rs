//! Resume tailoring pipeline.
//!
//! Flow: job posting text -> tailor prompt -> text model -> reasoning strip
//! -> keyword coverage report. The output is a `TailoredResume` the
//! orchestrator renders to a file and uploads during form filling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::fetcher::{truncate_chars, JOB_TEXT_MAX_CHARS};
use crate::llm_client::{strip_reasoning, ModelError, TextGenerator};

pub mod coverage;
mod prompts;

pub use coverage::CoverageReport;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Job posting text was empty")]
    EmptyPosting,

    #[error("Model returned an empty rewrite")]
    EmptyRewrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailoredResume {
    pub content: String,
    pub coverage: CoverageReport,
    pub created_at: DateTime<Utc>,
}

/// Rewrites the applicant's base resume against one posting.
#[derive(Clone)]
pub struct ResumeTailor {
    model: Arc<dyn TextGenerator>,
}

impl ResumeTailor {
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self { model }
    }

    pub async fn tailor(
        &self,
        job: &JobDescription,
        base_resume: &str,
    ) -> Result<TailoredResume, AnalysisError> {
        if job.text.trim().is_empty() {
            return Err(AnalysisError::EmptyPosting);
        }

        let job_text = truncate_chars(&job.text, JOB_TEXT_MAX_CHARS);
        let prompt = prompts::tailor_prompt(&job_text, base_resume);

        let raw = self.model.complete(&prompt).await?;
        let content = strip_reasoning(&raw).to_string();
        if content.is_empty() {
            return Err(AnalysisError::EmptyRewrite);
        }

        let coverage = coverage::report(&job_text, &content);
        info!(score = coverage.score, "Resume tailored for {}", job.url);

        Ok(TailoredResume {
            content,
            coverage,
            created_at: Utc::now(),
        })
    }
}
