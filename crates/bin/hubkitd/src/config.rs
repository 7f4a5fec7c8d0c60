//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `hubkit.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashSet;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Liveness watchdog settings.
    pub watchdog: WatchdogConfig,
    /// Built-in heartbeat worker settings.
    pub heartbeat: HeartbeatConfig,
    /// External services supervised by the daemon.
    pub services: Vec<ServiceConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Watchdog configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Restart dead external and threaded services every ten seconds.
    pub enabled: bool,
}

/// Heartbeat configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Run the heartbeat worker, pinged once a minute.
    pub enabled: bool,
}

/// One external service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Unique service name.
    pub name: String,
    /// Shell command, run through `sh -c`.
    pub command: String,
    /// Start together with the daemon.
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

fn default_autostart() -> bool {
    true
}

impl Config {
    /// Load configuration from `hubkit.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hubkit.toml")?;
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
        if let Ok(val) = std::env::var("HUBKIT_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("HUBKIT_WATCHDOG")
            && let Some(enabled) = parse_flag(&val)
        {
            self.watchdog.enabled = enabled;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for service in &self.services {
            let name = service.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "service name must not be empty".to_string(),
                ));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate service name {name:?}"
                )));
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hubkitd=info,hubkit_app=info,hubkit_adapter_workers=info,hubkit_adapter_process=info"
                .to_string(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { enabled: true }
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
