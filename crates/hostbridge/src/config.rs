//! Bridge configuration loading.
//!
//! Configuration comes from a YAML file (optional), then environment
//! overrides. Every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6400
}

fn default_buffer_size() -> usize {
    16 * 1024
}

fn default_timeout_secs() -> f64 {
    15.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// Connection settings for the editor host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Size of each socket read in the receive loop
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Per-read timeout, also used for connect and write
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay, doubled after every failed attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            buffer_size: default_buffer_size(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl BridgeConfig {
    /// Default config location: `~/.hostbridge/config.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".hostbridge")
            .join("config.yaml")
    }

    /// Load configuration from a YAML file, or defaults if it doesn't exist.
    /// Environment overrides are applied and the result is validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                ConfigError::IoError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Self::parse(&contents).map_err(|e| match e {
                ConfigError::ParseError(msg) => {
                    ConfigError::ParseError(format!("Failed to parse {}: {}", path.display(), msg))
                }
                other => other,
            })?
        } else {
            log::info!("Config file not found, using defaults: {}", path.display());
            Self::default()
        };

        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HOSTBRIDGE_*` environment variables on top of this config.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(host) = std::env::var("HOSTBRIDGE_HOST") {
            self.host = host;
        }
        if let Some(port) = env_parse::<u16>("HOSTBRIDGE_PORT")? {
            self.port = port;
        }
        if let Some(timeout) = env_parse::<f64>("HOSTBRIDGE_TIMEOUT")? {
            self.timeout_secs = timeout;
        }
        if let Some(retries) = env_parse::<u32>("HOSTBRIDGE_MAX_RETRIES")? {
            self.max_retries = retries;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be non-zero".to_string()));
        }
        if self.timeout_secs <= 0.0 || Duration::try_from_secs_f64(self.timeout_secs).is_err() {
            return Err(ConfigError::Invalid(format!(
                "timeout_secs must be a positive number of seconds in range, got {}",
                self.timeout_secs
            )));
        }
        Ok(())
    }

    /// `host:port` for connecting and error messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Values `validate` rejects saturate instead of panicking.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
