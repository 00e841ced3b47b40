//! Errors raised while locating, parsing, validating or saving configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read config file
    #[error("Failed to read configuration file '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Failed to write config file
    #[error("Failed to write configuration file '{}': {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but cannot be used
    #[error("Invalid configuration value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// A `TIMED_SERIAL_*` override could not be parsed
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },

    /// Saving was requested but the loader has no file to save to
    #[error("No configuration file path set")]
    NoPath,
}

impl ConfigError {
    /// Create a validation error
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an env parse error
    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }

    /// Map a failed read of `path`, keeping "missing file" distinct.
    pub(crate) fn read(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::ReadError { path, source }
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = ConfigError::read(
            PathBuf::from("missing.toml"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert_eq!(err.to_string(), "Configuration file not found: missing.toml");
    }

    #[test]
    fn test_validation_message() {
        let err = ConfigError::validation("serial.default_baud", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'serial.default_baud': must be greater than zero"
        );
    }
}
