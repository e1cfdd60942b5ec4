//! Configuration management for the device service
//!
//! Loads configuration from mcdev.toml at startup.
//! Every sizing knob lives here instead of in constants.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "MCDEV_CONFIG";

/// Service configuration
///
/// Loaded from mcdev.toml at startup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Endpoint sizing
    #[serde(default)]
    pub device: DeviceConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Endpoint pool and buffer configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Number of data endpoint slots (identifiers 1..=max_endpoints)
    #[serde(default = "default_max_endpoints")]
    pub max_endpoints: usize,

    /// Per-endpoint ring buffer capacity in bytes
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// How long destroy waits for in-flight callers before deferring the
    /// store release to the last of them
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// EnvFilter directive, e.g. "info" or "mcdev=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_endpoints: default_max_endpoints(),
            buffer_capacity: default_buffer_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            level: default_log_level(),
        }
    }
}

impl DeviceConfig {
    #[inline]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_endpoints == 0 {
            return Err(ConfigError::Invalid("device.max_endpoints must be at least 1"));
        }
        if self.max_endpoints > u32::MAX as usize {
            return Err(ConfigError::Invalid("device.max_endpoints does not fit an identifier"));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid("device.buffer_capacity must be non-zero"));
        }
        Ok(())
    }
}

fn default_max_endpoints() -> usize {
    10
}

fn default_buffer_capacity() -> usize {
    1 << 20 // 1 MiB
}

fn default_drain_timeout_ms() -> u64 {
    1000
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the file named by `MCDEV_CONFIG`
    /// (default mcdev.toml)
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "mcdev.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.validate()
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}
