//! Terminal configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TILL_API_BASE_URL` - Base URL of the POS API (e.g. <https://pos.example.com/api>)
//!
//! ## Optional
//! - `TILL_HTTP_TIMEOUT_SECS` - HTTP request timeout in seconds (default: 30)
//! - `TILL_TOKEN_PATH` - Where the session token pair is persisted
//!   (default: `$HOME/.config/till/tokens.json`, falling back to
//!   `till-tokens.json` in the working directory)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Terminal application configuration.
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Base URL of the POS API. Request paths are appended to this.
    pub api_base_url: Url,
    /// Timeout applied to every HTTP request.
    pub http_timeout: Duration,
    /// File the session token pair is persisted to.
    pub token_path: PathBuf,
}

impl TerminalConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url_raw = std::env::var("TILL_API_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("TILL_API_BASE_URL".to_string()))?;
        let api_base_url = parse_base_url(&base_url_raw)?;

        let http_timeout = match std::env::var("TILL_HTTP_TIMEOUT_SECS") {
            Ok(raw) => parse_timeout_secs(&raw)?,
            Err(_) => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let token_path = std::env::var("TILL_TOKEN_PATH")
            .map_or_else(|_| default_token_path(), PathBuf::from);

        Ok(Self {
            api_base_url,
            http_timeout,
            token_path,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("TILL_API_BASE_URL".to_string(), e.to_string())
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            "TILL_API_BASE_URL".to_string(),
            format!("unsupported scheme: {}", url.scheme()),
        ));
    }

    Ok(url)
}

fn parse_timeout_secs(raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw.parse().map_err(|_| {
        ConfigError::InvalidEnvVar(
            "TILL_HTTP_TIMEOUT_SECS".to_string(),
            format!("not a number: {raw}"),
        )
    })?;

    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "TILL_HTTP_TIMEOUT_SECS".to_string(),
            "timeout must be at least 1 second".to_string(),
        ));
    }

    Ok(Duration::from_secs(secs))
}

fn default_token_path() -> PathBuf {
    std::env::var("HOME").map_or_else(
        |_| PathBuf::from("till-tokens.json"),
        |home| {
            PathBuf::from(home)
                .join(".config")
                .join("till")
                .join("tokens.json")
        },
    )
}
