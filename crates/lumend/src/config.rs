//! Configuration file parsing and structures.
//!
//! lumend reads a single TOML file. Only the `[mqtt]` section is required; the
//! broker settings are consumed by the bus adapter and never reach the rule
//! engine.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

fn default_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    3000
}

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"lumend::engine" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build a tracing filter from the configured levels.
    ///
    /// `level` replaces the configured default level when given (CLI flag).
    pub fn targets(&self, level: Option<LogLevel>) -> Targets {
        let default = level.unwrap_or(self.level);
        Targets::new()
            .with_default(LevelFilter::from(default))
            .with_targets(
                self.overrides
                    .iter()
                    .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
            )
    }
}

/// MQTT broker connection
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname or IP address
    pub address: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// MQTT client ID (default: "lumend-<hostname>")
    #[serde(default)]
    pub client_id: Option<String>,

    /// Optional username for authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for authentication
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Topic filters, subscribed in order
    #[serde(default)]
    pub topics: Vec<String>,
}

impl MqttConfig {
    /// The configured client ID, or one derived from the hostname.
    pub fn client_id(&self) -> String {
        if let Some(id) = &self.client_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        format!("lumend-{}", hostname)
    }
}

/// Rule engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Grace window after a manual switch-off before the occupancy sensor is re-armed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl RulesConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        contents.parse()
    }

    /// Check constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.address.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "mqtt.address",
                message: "must not be empty".to_string(),
            });
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::Invalid {
                field: "mqtt.port",
                message: "must be non-zero".to_string(),
            });
        }
        if self.mqtt.username.is_some() != self.mqtt.password.is_some() {
            return Err(ConfigError::Invalid {
                field: "mqtt.username",
                message: "username and password must be set together".to_string(),
            });
        }
        if let Some(topic) = self.mqtt.topics.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "mqtt.topics",
                message: format!("invalid topic filter {:?}", topic),
            });
        }
        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}
