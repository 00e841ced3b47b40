//! Tracing subscriber setup for the command-line tool.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary, which calls [`init`] once at startup.

use crate::config::{ConfigError, ConfigResult, LogFormat, LoggingConfig};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

/// Build the event filter. `RUST_LOG`, when set, wins over the configured
/// level.
pub fn build_filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse(&config.level)
        .map_err(|e| ConfigError::validation("logging.level", e.to_string()))
}

/// Install the global subscriber, writing to stderr.
///
/// Calling this again after a subscriber is installed leaves the first one
/// in place.
pub fn init(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = build_filter(config)?;
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}
