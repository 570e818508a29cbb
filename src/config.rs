use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bus::DEFAULT_CHANNEL_CAPACITY;

pub const ENV_API_URL: &str = "JOBPORTAL_API_URL";
pub const ENV_TIMEOUT_MS: &str = "JOBPORTAL_TIMEOUT_MS";
pub const ENV_CHANNEL_CAPACITY: &str = "JOBPORTAL_CHANNEL_CAPACITY";
pub const ENV_TOKEN: &str = "JOBPORTAL_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("invalid config file {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            auth_token: None,
        }
    }
}

impl PortalConfig {
    /// Defaults, then the optional JSON file, then environment overrides
    /// (including a `.env` file in the working directory).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|error| ConfigError::Parse {
            path: path.display().to_string(),
            reason: error.to_string(),
        })
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_value(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(timeout) = env_value(ENV_TIMEOUT_MS).and_then(|raw| raw.parse().ok()) {
            self.request_timeout_ms = timeout;
        }
        if let Some(capacity) = env_value(ENV_CHANNEL_CAPACITY).and_then(|raw| raw.parse().ok()) {
            self.channel_capacity = capacity;
        }
        if let Some(token) = env_value(ENV_TOKEN) {
            self.auth_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("apiBaseUrl cannot be empty".to_string()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "apiBaseUrl must be an http(s) URL, got {url}"
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "requestTimeoutMs must be greater than 0".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channelCapacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_api_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}
