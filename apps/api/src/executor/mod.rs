//! Plan construction and step execution.
//!
//! The executor owns three things: the ordered `ApplicationPlan` built from
//! the applicant profile, the pure `decide` policy that turns a page
//! observation into the next move, and `apply_step`, which pushes one plan
//! step through the browser with a bounded retry.

use std::path::PathBuf;

use tracing::debug;

use crate::browser::{BrowserDriver, DriverError};
use crate::inspect::{PageObservation, PageState};
use crate::profile::ApplicantProfile;
use crate::vault::SurrogateCredential;

/// Driver-level failures get exactly one retry before the step is declared
/// failed.
pub const DRIVER_RETRIES: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Human-readable name, used in prompts and intervention messages.
    pub label: &'static str,
    /// CSS selector tried against the live page.
    pub selector: String,
}

#[derive(Debug, Clone)]
pub enum StepAction {
    Fill {
        field: FieldSpec,
        value: String,
        /// Redacted values never appear in logs or status output.
        redact: bool,
    },
    Upload {
        field: FieldSpec,
        path: PathBuf,
    },
    Click {
        field: FieldSpec,
    },
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub action: StepAction,
    /// Optional steps are skipped when their target is absent; required steps
    /// fail the session instead.
    pub optional: bool,
}

impl PlanStep {
    pub fn field(&self) -> &FieldSpec {
        match &self.action {
            StepAction::Fill { field, .. } => field,
            StepAction::Upload { field, .. } => field,
            StepAction::Click { field } => field,
        }
    }

    /// Log-safe description; redacted fill values are masked.
    pub fn describe(&self) -> String {
        match &self.action {
            StepAction::Fill {
                field,
                value,
                redact,
            } => {
                let shown = if *redact { "********" } else { value.as_str() };
                format!("fill '{}' with '{}'", field.label, shown)
            }
            StepAction::Upload { field, path } => {
                format!("upload '{}' from {}", field.label, path.display())
            }
            StepAction::Click { field } => format!("click '{}'", field.label),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationPlan {
    steps: Vec<PlanStep>,
    cursor: usize,
}

impl ApplicationPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps, cursor: 0 }
    }

    pub fn current(&self) -> Option<&PlanStep> {
        self.steps.get(self.cursor)
    }

    pub fn advance(&mut self) {
        if self.cursor < self.steps.len() {
            self.cursor += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Labels of the required input fields still ahead of the cursor. This is
    /// what the vision model is told to look for; clicks and optional steps
    /// are not worth pausing over.
    pub fn expected_fields(&self) -> Vec<String> {
        self.steps[self.cursor..]
            .iter()
            .filter(|step| !step.optional && !matches!(step.action, StepAction::Click { .. }))
            .map(|step| step.field().label.to_string())
            .collect()
    }
}

/// The standard single-page application plan: contact fields, resume upload,
/// an account password when the form asks for one, then submit.
pub fn default_plan(
    profile: &ApplicantProfile,
    credential: &SurrogateCredential,
    resume_path: PathBuf,
) -> ApplicationPlan {
    ApplicationPlan::new(vec![
        PlanStep {
            action: StepAction::Fill {
                field: FieldSpec {
                    label: "full name",
                    selector: "input[name*='name' i]".to_string(),
                },
                value: profile.full_name.clone(),
                redact: false,
            },
            optional: false,
        },
        PlanStep {
            action: StepAction::Fill {
                field: FieldSpec {
                    label: "email",
                    selector: "input[type='email'], input[name*='email' i]".to_string(),
                },
                value: profile.email.clone(),
                redact: false,
            },
            optional: false,
        },
        PlanStep {
            action: StepAction::Fill {
                field: FieldSpec {
                    label: "phone",
                    selector: "input[type='tel'], input[name*='phone' i]".to_string(),
                },
                value: profile.phone.clone(),
                redact: false,
            },
            optional: false,
        },
        PlanStep {
            action: StepAction::Upload {
                field: FieldSpec {
                    label: "resume",
                    selector: "input[type='file']".to_string(),
                },
                path: resume_path,
            },
            optional: false,
        },
        PlanStep {
            action: StepAction::Fill {
                field: FieldSpec {
                    label: "account password",
                    selector: "input[type='password']".to_string(),
                },
                value: credential.password.clone(),
                redact: true,
            },
            optional: true,
        },
        PlanStep {
            action: StepAction::Click {
                field: FieldSpec {
                    label: "submit",
                    selector: "button[type='submit'], input[type='submit']".to_string(),
                },
            },
            optional: false,
        },
    ])
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision policy
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Act on the current plan step.
    Proceed,
    /// Wait and re-observe the page.
    Retry,
    /// Stop and ask a human.
    Pause { prompt: String },
}

/// Maps an observation and the retry budget already spent to the next move.
/// Pure so the whole policy is table-testable.
pub fn decide(observation: &PageObservation, attempt: u32, max_retries: u32) -> Directive {
    match observation.state {
        PageState::Ready => Directive::Proceed,
        PageState::Captcha => Directive::Pause {
            prompt: "A CAPTCHA is blocking the application. Solve it in the live browser \
                     session, then submit any value here to continue."
                .to_string(),
        },
        PageState::MissingField => {
            if attempt < max_retries {
                Directive::Retry
            } else {
                let fields = if observation.missing_fields.is_empty() {
                    "some required fields".to_string()
                } else {
                    observation.missing_fields.join(", ")
                };
                Directive::Pause {
                    prompt: format!(
                        "The page is missing {fields}. Fill or correct the form manually, \
                         or provide the value if a single field needs one."
                    ),
                }
            }
        }
        PageState::UnknownLayout => {
            if attempt < max_retries {
                Directive::Retry
            } else {
                Directive::Pause {
                    prompt: "The page layout was not recognized as an application form. \
                             Advance it manually, then submit any value here to continue."
                        .to_string(),
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Step execution
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    SkippedOptional,
}

/// Applies one step through the driver. Missing targets on optional steps are
/// skipped; everything else gets one retry before failing.
pub async fn apply_step(
    driver: &dyn BrowserDriver,
    step: &PlanStep,
) -> Result<StepOutcome, DriverError> {
    let mut last_error: Option<DriverError> = None;

    for attempt in 0..=DRIVER_RETRIES {
        if attempt > 0 {
            debug!("Retrying step: {}", step.describe());
        }

        let result = match &step.action {
            StepAction::Fill { field, value, .. } => driver.fill(&field.selector, value).await,
            StepAction::Upload { field, path } => driver.upload(&field.selector, path).await,
            StepAction::Click { field } => driver.click(&field.selector).await,
        };

        match result {
            Ok(()) => return Ok(StepOutcome::Applied),
            Err(DriverError::ElementNotFound { .. }) if step.optional => {
                return Ok(StepOutcome::SkippedOptional);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or(DriverError::Timeout {
        detail: "step retry loop exited without an error".to_string(),
    }))
}
