//! Job posting retrieval.
//!
//! Sessions launched with only a URL need the posting text before tailoring
//! can start. `HttpJobSource` pulls the page and reduces it to prose; callers
//! that already hold the text (queue imports, tests) bypass this entirely.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::browser::dom;

/// Postings are clipped to this many characters before prompting; beyond it
/// the text is boilerplate that only slows the model down.
pub const JOB_TEXT_MAX_CHARS: usize = 12_000;

const FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetching {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Page at {url} contained no readable text")]
    EmptyPage { url: String },
}

#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct HttpJobSource {
    client: Client,
}

impl HttpJobSource {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl Default for HttpJobSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        let text = truncate_chars(&dom::visible_text(&html), JOB_TEXT_MAX_CHARS);
        if text.trim().is_empty() {
            return Err(FetchError::EmptyPage {
                url: url.to_string(),
            });
        }
        Ok(text)
    }
}

/// Truncates on a character boundary, never mid-codepoint.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_multibyte_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 4), "héll");
        assert_eq!(truncate_chars(text, 100), text);
    }

    #[test]
    fn test_truncate_chars_exact_length_is_untouched() {
        assert_eq!(truncate_chars("abc", 3), "abc");
    }
}
