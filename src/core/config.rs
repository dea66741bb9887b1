use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::dates::DEFAULT_ENCODING;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Default organization id when `--org` is not given
    pub org: Option<String>,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Seconds slept after every successful request
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// Seconds slept after a 429 before retrying
    #[serde(default = "default_rate_limit_wait")]
    pub rate_limit_wait: f64,
    /// Per-day 429 retry cap, 0 for unbounded
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: f64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}
fn default_rate() -> f64 {
    2.5
}
fn default_rate_limit_wait() -> f64 {
    10.0
}
fn default_max_retries() -> u32 {
    20
}
fn default_request_timeout() -> f64 {
    60.0
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            org: None,
            encoding: default_encoding(),
            rate: default_rate(),
            rate_limit_wait: default_rate_limit_wait(),
            max_retries: default_max_retries(),
            request_timeout: default_request_timeout(),
            api_base: default_api_base(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("oaiusage").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let s = &self.settings;
        for (name, value) in [
            ("rate", s.rate),
            ("rate_limit_wait", s.rate_limit_wait),
        ] {
            if !value.is_finite() || value < 0.0 {
                issues.push(format!("Invalid {}: {} (must be >= 0 seconds)", name, value));
            } else if Duration::try_from_secs_f64(value).is_err() {
                issues.push(format!("Invalid {}: {} (too large)", name, value));
            }
        }
        if !s.request_timeout.is_finite() || s.request_timeout <= 0.0 {
            issues.push(format!(
                "Invalid request_timeout: {} (must be > 0 seconds)",
                s.request_timeout
            ));
        } else if Duration::try_from_secs_f64(s.request_timeout).is_err() {
            issues.push(format!(
                "Invalid request_timeout: {} (too large)",
                s.request_timeout
            ));
        }
        if !["auto", "always", "never"].contains(&s.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                s.color
            ));
        }
        if let Err(e) = crate::core::fetcher::validate_endpoint(&s.api_base) {
            issues.push(format!("Invalid api_base: {}", e));
        }
        if s.encoding.is_empty() {
            issues.push("Invalid encoding: must not be empty".to_string());
        }
        issues
    }
}
