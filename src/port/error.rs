//! Port-specific error types.
//!
//! Every failure a caller can see from a port falls into one of four
//! [`ErrorKind`]s, since the sensible retry strategy differs per kind.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The transport could not be acquired (busy, removed, permission denied).
    #[error("Failed to open serial port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Attempted to open a port that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// The transfer did not complete before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was cancelled by its caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Coarse classification of a [`PortError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transport could not be acquired; the session never started.
    OpenFailure,
    /// A deadline expired with the transfer incomplete.
    Timeout,
    /// The device or OS reported a fault; the transfer was aborted.
    Transport,
    /// The caller cancelled the operation.
    Cancelled,
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create an OpenFailed error for a port.
    pub fn open_failed(port_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::OpenFailed {
            port: port_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::OpenFailed { .. } | Self::AlreadyOpen => {
                ErrorKind::OpenFailure
            }
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NotOpen | Self::Io(_) | Self::Config(_) | Self::Serial(_) => {
                ErrorKind::Transport
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Whether this is an I/O condition that only means "no progress yet".
    ///
    /// Raw transports report an empty receive buffer or a full transmit
    /// buffer this way; the timed core treats it like a zero-byte transfer.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
