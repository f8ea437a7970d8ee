//! Browser control layer.
//!
//! The orchestrator drives pages through the `BrowserDriver` trait and never
//! sees WebDriver wire details. `webdriver` holds the chromedriver-backed
//! implementation; `dom` compresses raw page HTML into the small digest the
//! vision prompts carry.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod dom;
pub mod webdriver;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to reach the browser: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("No element matches selector '{selector}'")]
    ElementNotFound { selector: String },

    #[error("Element '{selector}' is not interactable")]
    NotInteractable { selector: String },

    #[error("Browser operation timed out: {detail}")]
    Timeout { detail: String },

    #[error("WebDriver protocol error: {detail}")]
    Protocol { detail: String },
}

/// Everything the agent does inside a live browser session.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), DriverError>;
    async fn screenshot(&self) -> Result<Bytes, DriverError>;
    async fn page_source(&self) -> Result<String, DriverError>;
    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;
    async fn click(&self, selector: &str) -> Result<(), DriverError>;
    async fn upload(&self, selector: &str, path: &Path) -> Result<(), DriverError>;
    async fn quit(&self) -> Result<(), DriverError>;
}

/// Launches fresh browser sessions. One driver per application session; the
/// orchestrator owns the handle and quits it on the way out.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError>;
}
