/// Model client — the single point of entry for all Ollama calls in Emissary.
///
/// ARCHITECTURAL RULE: No other module may talk to the inference backend
/// directly. All model interactions MUST go through this module.
///
/// Two models are in play: a text model for resume rewriting and a vision
/// model for page classification. Both ride the same `/api/generate`
/// endpoint; the vision path attaches a base64 screenshot.
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default text model for resume tailoring.
pub const DEFAULT_TEXT_MODEL: &str = "deepseek-r1:32b";
/// Default vision model for screenshot classification.
pub const DEFAULT_VISION_MODEL: &str = "llava:7b";

const MODEL_TIMEOUT_SECS: u64 = 120;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model unavailable after {retries} retries")]
    Unavailable { retries: u32 },

    #[error("Model returned empty output")]
    EmptyOutput,
}

/// Text completion seam. The orchestration layer depends on this trait, not
/// on the concrete client, so tests can substitute scripted fakes.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Vision seam: a prompt plus one PNG screenshot in, free text out.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete_with_image(
        &self,
        prompt: &str,
        image_png: &[u8],
    ) -> Result<String, ModelError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// The single model client used by all services in Emissary.
/// Wraps the Ollama generate API with retry logic and output helpers.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    text_model: String,
    vision_model: String,
}

impl OllamaClient {
    pub fn new(base_url: String, text_model: String, vision_model: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(MODEL_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            text_model,
            vision_model,
        }
    }

    /// Makes a raw call to the Ollama generate endpoint.
    /// Retries on 429 and 5xx errors with exponential backoff.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        images: Option<Vec<String>>,
    ) -> Result<String, ModelError> {
        let url = format!("{}/api/generate", self.base_url);
        let request_body = GenerateRequest {
            model,
            prompt,
            stream: false,
            images,
        };

        let mut last_error: Option<ModelError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Model call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self.client.post(&url).json(&request_body).send().await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ModelError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Ollama returned {}: {}", status, body);
                last_error = Some(ModelError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ModelError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let parsed: GenerateResponse = response.json().await?;

            if parsed.response.trim().is_empty() {
                return Err(ModelError::EmptyOutput);
            }

            debug!(
                "Model call succeeded: model={}, output_chars={}",
                model,
                parsed.response.len()
            );

            return Ok(parsed.response);
        }

        Err(last_error.unwrap_or(ModelError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.generate(&self.text_model, prompt, None).await
    }
}

#[async_trait]
impl VisionModel for OllamaClient {
    async fn complete_with_image(
        &self,
        prompt: &str,
        image_png: &[u8],
    ) -> Result<String, ModelError> {
        let encoded = B64.encode(image_png);
        self.generate(&self.vision_model, prompt, Some(vec![encoded]))
            .await
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Drops a leading chain-of-thought block from model output.
/// deepseek-r1 wraps its scratchpad in <think>...</think> before the answer.
pub fn strip_reasoning(text: &str) -> &str {
    match text.find("</think>") {
        Some(idx) => text[idx + "</think>".len()..].trim(),
        None => text.trim(),
    }
}

/// Parses model output as JSON after removing fences and reasoning blocks.
/// The prompt must instruct the model to return valid JSON.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ModelError> {
    let text = strip_json_fences(strip_reasoning(text));
    serde_json::from_str(text).map_err(ModelError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_reasoning_removes_think_block() {
        let input = "<think>weighing the keywords here</think>\nFinal bullet points.";
        assert_eq!(strip_reasoning(input), "Final bullet points.");
    }

    #[test]
    fn test_strip_reasoning_passthrough_without_block() {
        assert_eq!(strip_reasoning("  plain output  "), "plain output");
    }

    #[test]
    fn test_parse_json_handles_fenced_output_with_reasoning() {
        #[derive(Deserialize)]
        struct Out {
            status: String,
        }
        let input = "<think>hmm</think>\n```json\n{\"status\": \"READY\"}\n```";
        let parsed: Out = parse_json(input).unwrap();
        assert_eq!(parsed.status, "READY");
    }
}
