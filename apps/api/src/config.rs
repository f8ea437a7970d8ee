use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_TEXT_MODEL, DEFAULT_VISION_MODEL};

/// Application configuration loaded from environment variables.
/// Every knob has a local-deployment default; a bare `cargo run` next to a
/// local Ollama and chromedriver works without a .env file.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub ollama_base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub webdriver_url: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: env_or("DATABASE_URL", "sqlite://emissary.db"),
            ollama_base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            text_model: env_or("TEXT_MODEL", DEFAULT_TEXT_MODEL),
            vision_model: env_or("VISION_MODEL", DEFAULT_VISION_MODEL),
            webdriver_url: env_or("WEBDRIVER_URL", "http://localhost:9515"),
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
