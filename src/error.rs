//! Application-level error type for the `timed-serial` command.
//!
//! Wraps the library's port and configuration errors together with CLI
//! argument problems, and maps each to a process exit code.

use crate::config::ConfigError;
use crate::port::{ErrorKind, PortError};
use std::fmt;

/// Unified application error type.
#[derive(Debug)]
pub enum AppError {
    Port(PortError),
    Config(ConfigError),
    InvalidArgument(String),
    Io(std::io::Error),
}

impl AppError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Exit code for the process: 2 for a timeout, 3 for cancellation and
    /// 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Port(e) => match e.kind() {
                ErrorKind::Timeout => 2,
                ErrorKind::Cancelled => 3,
                ErrorKind::OpenFailure | ErrorKind::Transport => 1,
            },
            Self::Config(_) | Self::InvalidArgument(_) | Self::Io(_) => 1,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "{e}"),
            Self::InvalidArgument(details) => write!(f, "Invalid argument: {details}"),
            Self::Io(e) => write!(f, "An I/O error occurred: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Port(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::InvalidArgument(_) => None,
        }
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        AppError::Port(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<hex::FromHexError> for AppError {
    fn from(err: hex::FromHexError) -> Self {
        AppError::InvalidArgument(format!("payload is not valid hex: {err}"))
    }
}

/// Result alias for the command-line layer.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        let timeout: AppError = PortError::timeout(Duration::from_millis(5)).into();
        let cancelled: AppError = PortError::Cancelled.into();
        let missing: AppError = PortError::not_found("/dev/ttyUSB9").into();

        assert_eq!(timeout.exit_code(), 2);
        assert_eq!(cancelled.exit_code(), 3);
        assert_eq!(missing.exit_code(), 1);
        assert_eq!(AppError::invalid_argument("count").exit_code(), 1);
    }

    #[test]
    fn test_hex_error_is_invalid_argument() {
        let err: AppError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert!(err.to_string().starts_with("Invalid argument"));
    }
}
