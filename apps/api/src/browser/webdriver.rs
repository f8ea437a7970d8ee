//! WebDriver-backed browser driver.
//!
//! Speaks the W3C WebDriver wire protocol to a chromedriver (or any
//! compliant remote end) over plain HTTP. Deliberately thin: no frames, no
//! action chains, no shadow DOM. Pages that need those classify as unknown
//! layout upstream and pause for a human instead.

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{BrowserDriver, DriverError, DriverFactory};

/// W3C element identifier key in find-element responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const HTTP_TIMEOUT_SECS: u64 = 90;

/// Creates chromedriver sessions against a fixed remote endpoint.
#[derive(Clone)]
pub struct WebDriverFactory {
    client: Client,
    base_url: String,
}

impl WebDriverFactory {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--no-sandbox", "--disable-gpu", "--window-size=1920,1080"]
                    }
                }
            }
        });

        let response = self
            .client
            .post(format!("{}/session", self.base_url))
            .json(&capabilities)
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(connection_error)?;

        if !status.is_success() {
            return Err(protocol_error(status, &payload));
        }

        let session_id = payload
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol {
                detail: "session response carried no sessionId".to_string(),
            })?
            .to_string();

        debug!("WebDriver session {} started", session_id);

        Ok(Box::new(WebDriverClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session_id,
        }))
    }
}

/// One live WebDriver session.
pub struct WebDriverClient {
    client: Client,
    base_url: String,
    session_id: String,
}

impl WebDriverClient {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(connection_error)?;
        let status = response.status();
        let payload: Value = response.json().await.map_err(connection_error)?;

        if status.is_success() {
            Ok(payload["value"].clone())
        } else {
            Err(protocol_error(status, &payload))
        }
    }

    async fn find_element(&self, selector: &str) -> Result<String, DriverError> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = self
            .command(Method::POST, "/element", Some(body))
            .await
            .map_err(|e| match e {
                DriverError::Protocol { ref detail } if detail.contains("no such element") => {
                    DriverError::ElementNotFound {
                        selector: selector.to_string(),
                    }
                }
                other => other,
            })?;

        value[ELEMENT_KEY]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::Protocol {
                detail: format!("find-element response carried no {ELEMENT_KEY}"),
            })
    }

    /// Reclassifies protocol errors raised while sending keys or clicking.
    fn tag_interaction_error(error: DriverError, selector: &str) -> DriverError {
        match error {
            DriverError::Protocol { ref detail } if detail.contains("not interactable") => {
                DriverError::NotInteractable {
                    selector: selector.to_string(),
                }
            }
            other => other,
        }
    }
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    async fn open(&self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map_err(|e| DriverError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Bytes, DriverError> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value.as_str().ok_or_else(|| DriverError::Protocol {
            detail: "screenshot response was not a string".to_string(),
        })?;
        let decoded = B64.decode(encoded).map_err(|e| DriverError::Protocol {
            detail: format!("screenshot was not valid base64: {e}"),
        })?;
        Ok(Bytes::from(decoded))
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let value = self.command(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::Protocol {
                detail: "page source response was not a string".to_string(),
            })
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let element = self.find_element(selector).await?;
        self.command(Method::POST, &format!("/element/{element}/clear"), Some(json!({})))
            .await
            .map_err(|e| Self::tag_interaction_error(e, selector))?;
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": value })),
        )
        .await
        .map_err(|e| Self::tag_interaction_error(e, selector))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self.find_element(selector).await?;
        self.command(Method::POST, &format!("/element/{element}/click"), Some(json!({})))
            .await
            .map_err(|e| Self::tag_interaction_error(e, selector))?;
        Ok(())
    }

    async fn upload(&self, selector: &str, path: &Path) -> Result<(), DriverError> {
        let element = self.find_element(selector).await?;
        // File inputs receive the local path as keystrokes; chromedriver
        // resolves it on the machine the browser runs on.
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": path.to_string_lossy() })),
        )
        .await
        .map_err(|e| Self::tag_interaction_error(e, selector))?;
        Ok(())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

fn connection_error(error: reqwest::Error) -> DriverError {
    if error.is_timeout() {
        DriverError::Timeout {
            detail: error.to_string(),
        }
    } else {
        DriverError::ConnectionFailed {
            reason: error.to_string(),
        }
    }
}

fn protocol_error(status: StatusCode, payload: &Value) -> DriverError {
    let code = payload
        .pointer("/value/error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = payload
        .pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or("");

    if code == "timeout" || code == "script timeout" {
        return DriverError::Timeout {
            detail: format!("{code}: {message}"),
        };
    }

    DriverError::Protocol {
        detail: format!("status {status}, {code}: {message}"),
    }
}
