//! Game Service configuration.
//!
//! Configuration is loaded from environment variables. Connection strings
//! and the publisher API key are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default timeout for a single store or cache operation, in milliseconds.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Default timeout for a single publish call, in milliseconds.
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 3_000;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Centrifugo HTTP API settings.
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    /// Base URL of the Centrifugo server (e.g., "http://centrifugo:8000").
    pub api_url: String,

    /// API key sent in the `X-API-Key` header.
    pub api_key: SecretString,
}

/// Game Service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Redis connection URL. When unset, membership snapshots are kept
    /// in process memory.
    pub redis_url: Option<String>,

    /// Notification transport. When unset, join events are only logged.
    pub publisher: Option<PublisherConfig>,

    /// Upper bound for each store/cache call and per-game lock wait.
    pub store_timeout: Duration,

    /// Upper bound for each publish call.
    pub publish_timeout: Duration,

    /// Log output format.
    pub log_format: LogFormat,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field(
                "redis_url",
                &self.redis_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("publisher", &self.publisher)
            .field("store_timeout", &self.store_timeout)
            .field("publish_timeout", &self.publish_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let redis_url = vars
            .get("REDIS_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let publisher = match vars
            .get("CENTRIFUGO_API_URL")
            .filter(|url| !url.trim().is_empty())
        {
            Some(api_url) => {
                let api_key = vars.get("CENTRIFUGO_API_KEY").ok_or_else(|| {
                    ConfigError::MissingEnvVar("CENTRIFUGO_API_KEY".to_string())
                })?;
                Some(PublisherConfig {
                    api_url: api_url.trim_end_matches('/').to_string(),
                    api_key: SecretString::from(api_key.clone()),
                })
            }
            None => None,
        };

        let store_timeout =
            parse_timeout_ms(vars, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;
        let publish_timeout =
            parse_timeout_ms(vars, "PUBLISH_TIMEOUT_MS", DEFAULT_PUBLISH_TIMEOUT_MS)?;

        let log_format = match vars.get("LOG_FORMAT").map(|s| s.to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(value) if value == "text" => LogFormat::Text,
            Some(value) if value == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )))
            }
        };

        Ok(Config {
            database_url,
            bind_address,
            redis_url,
            publisher,
            store_timeout,
            publish_timeout,
            log_format,
        })
    }
}

fn parse_timeout_ms(
    vars: &HashMap<String, String>,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_millis(default_ms));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Duration::from_millis(value))
}
