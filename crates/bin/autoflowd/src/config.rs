//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `autoflow.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use autoflow_adapter_storage_sqlite_sqlx::{DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS};
use autoflow_app::engine::DEFAULT_MAX_STEPS;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Geofence monitor settings.
    pub monitor: MonitorConfig,
    /// Location feed settings.
    pub location: LocationConfig,
    /// Execution engine settings.
    pub engine: EngineConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    /// Pool size shared by the services and concurrent runs.
    pub max_connections: u32,
    /// Milliseconds a statement waits on a locked database.
    pub busy_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Commands buffered before `push_sample` waits.
    pub channel_capacity: usize,
    /// Slots of the transition broadcast channel.
    pub bus_capacity: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// NDJSON file of location samples; unset or `-` reads stdin.
    pub feed: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Node visits allowed per run.
    pub max_steps: usize,
}

/// Where location samples come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Stdin,
    File(PathBuf),
}

impl Config {
    /// Load configuration from `autoflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("autoflow.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AUTOFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("AUTOFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("AUTOFLOW_LOCATION_FEED") {
            self.location.feed = Some(val);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database url must not be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database max_connections must be non-zero".to_string(),
            ));
        }
        if self.monitor.channel_capacity == 0 || self.monitor.bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "monitor capacities must be non-zero".to_string(),
            ));
        }
        if self.engine.max_steps == 0 {
            return Err(ConfigError::Validation(
                "engine max_steps must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Wait applied when the database is locked by another connection.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    /// Resolve the configured location feed.
    #[must_use]
    pub fn feed_source(&self) -> FeedSource {
        match self.location.feed.as_deref().map(str::trim) {
            None | Some("" | "-") => FeedSource::Stdin,
            Some(path) => FeedSource::File(PathBuf::from(path)),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:autoflow.db?mode=rwc".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: u64::try_from(DEFAULT_BUSY_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "autoflowd=info,autoflow=info".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            bus_capacity: 256,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
