//! Configuration for ports and logging.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `TIMED_SERIAL_CONFIG` environment variable (explicit path)
//! 2. `./timed-serial.toml` (current directory)
//! 3. The platform config directory (`~/.config/timed-serial/` on Linux,
//!    `%APPDATA%\timed-serial\config\` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any value can be overridden with `TIMED_SERIAL_<SECTION>_<KEY>`:
//! - `TIMED_SERIAL_SERIAL_DEFAULT_BAUD=9600`
//! - `TIMED_SERIAL_SERIAL_WRITE_TIMEOUT_MS=200`
//! - `TIMED_SERIAL_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```no_run
//! use timed_serial::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let serial = &loader.config().serial;
//! println!("Default baud: {}", serial.default_baud);
//! println!("Read timeout: {:?}", serial.read_timeout());
//! # Ok::<(), timed_serial::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
