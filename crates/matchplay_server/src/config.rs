//! Server configuration.

use crate::PredictorKind;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Config file read when no path is given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "matchplay.toml";

/// Environment variable overriding [`ServerConfig::database_path`].
pub const DATABASE_PATH_ENV: &str = "MATCHPLAY_DATABASE_PATH";

/// Environment variable overriding [`ServerConfig::idle_timeout_secs`].
pub const IDLE_TIMEOUT_ENV: &str = "MATCHPLAY_IDLE_TIMEOUT_SECS";

/// Settings for the `matchplay` server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    /// SQLite file holding participant scores.
    #[serde(default = "default_database_path")]
    #[setters(into)]
    database_path: String,

    /// Seconds of inactivity after which a participant is evicted.
    #[serde(default = "default_idle_timeout_secs")]
    idle_timeout_secs: u64,

    /// Seconds between sweeps. Defaults to the idle timeout.
    #[serde(default)]
    sweep_interval_secs: Option<u64>,

    /// Move selection for the automated opponent.
    #[serde(default)]
    predictor: PredictorKind,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    #[setters(into)]
    log_filter: String,

    /// Rows shown by `/leaders`.
    #[serde(default = "default_leaderboard_size")]
    leaderboard_size: usize,
}

#[instrument]
fn default_database_path() -> String {
    "matchplay.db".to_string()
}

#[instrument]
fn default_idle_timeout_secs() -> u64 {
    300
}

#[instrument]
fn default_log_filter() -> String {
    "info,matchplay_server=debug".to_string()
}

#[instrument]
fn default_leaderboard_size() -> usize {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: None,
            predictor: PredictorKind::default(),
            log_filter: default_log_filter(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        info!(database = %config.database_path, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` if given, else [`DEFAULT_CONFIG_FILE`] if it exists,
    /// else defaults. Environment overrides apply last.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit file is missing or any file or
    /// override is invalid.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => {
                debug!("No config file, using defaults");
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    /// Applies [`DATABASE_PATH_ENV`] and [`IDLE_TIMEOUT_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the timeout override is not a positive
    /// integer.
    #[instrument(skip(self))]
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
            debug!(path = %path, "Database path from environment");
            self.database_path = path;
        }
        if let Ok(raw) = std::env::var(IDLE_TIMEOUT_ENV) {
            self.idle_timeout_secs = raw.trim().parse().map_err(|e| {
                ConfigError::new(format!("{} must be a number of seconds: {}", IDLE_TIMEOUT_ENV, e))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero timeout, interval or leaderboard
    /// size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::new("idle_timeout_secs must be positive".to_string()));
        }
        if self.sweep_interval_secs == Some(0) {
            return Err(ConfigError::new("sweep_interval_secs must be positive".to_string()));
        }
        if self.leaderboard_size == 0 {
            warn!("Leaderboard size of zero requested");
            return Err(ConfigError::new("leaderboard_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Idle threshold.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Time between sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.unwrap_or(self.idle_timeout_secs))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
