//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! Every section has defaults, so an empty file is a valid configuration.

use super::error::{ConfigError, ConfigResult};
use crate::port::PortConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port configuration
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that would make a port unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        self.serial.validate()
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate for newly opened ports
    pub default_baud: u32,
    /// Default read timeout in milliseconds (0 waits forever)
    pub read_timeout_ms: u64,
    /// Default write timeout in milliseconds (0 waits forever)
    pub write_timeout_ms: u64,
    /// Back-off after a raw transfer that moved no bytes
    pub poll_interval_ms: u64,
    /// Native timeout used by blocking transports
    pub native_poll_slice_ms: u64,
    /// Port aliases for convenience
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 115200,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            poll_interval_ms: 1,
            native_poll_slice_ms: 10,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn native_poll_slice(&self) -> Duration {
        Duration::from_millis(self.native_poll_slice_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Line settings for a new port: 8N1 at `baud`, or the default baud.
    pub fn port_configuration(&self, baud: Option<u32>) -> PortConfiguration {
        PortConfiguration::with_baud(baud.unwrap_or(self.default_baud))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_baud == 0 {
            return Err(ConfigError::validation(
                "serial.default_baud",
                "must be greater than zero",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "serial.poll_interval_ms",
                "must be at least 1 ms",
            ));
        }
        if self.native_poll_slice_ms == 0 {
            return Err(ConfigError::validation(
                "serial.native_poll_slice_ms",
                "must be at least 1 ms",
            ));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive, e.g. "info" or "timed_serial=debug"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::validation(
                "logging.format",
                format!("unknown format '{}'", other),
            )),
        }
    }
}
