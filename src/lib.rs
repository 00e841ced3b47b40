//! Timed Serial Library
//!
//! Cross-platform serial port access where every read returns exactly the
//! requested number of bytes and every write sends its whole input, each
//! within an optional deadline.
//!
//! # Modules
//!
//! - `port`: transports, the timeout-governed core, scoped sessions and the
//!   async facade
//! - `registry`: discovery and vendor/product filtering of system ports
//! - `config`: configuration management with TOML support
//! - `logging`: tracing subscriber setup for binaries
//! - `error`: application error type used by the command-line tool

pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod registry;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use port::{
    DataBits, Deferred, ErrorKind, FlowControl, MockTransport, OpenPort, Parity,
    PortConfiguration, PortError, PortIdentity, SharedPort, StopBits, SyncSerialTransport,
    TimedPort, TokioSerialTransport, Transport,
};
pub use registry::{PortInfo, PortKind, PortRegistry, StaticPortRegistry, SystemPortRegistry};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
