//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "TIMED_SERIAL";

/// Config file name
const CONFIG_FILE_NAME: &str = "timed-serial.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "TIMED_SERIAL_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `TIMED_SERIAL_CONFIG` environment variable (explicit path)
    /// 2. `./timed-serial.toml` (current directory)
    /// 3. The platform config directory, e.g. `~/.config/timed-serial/`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override any file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides still apply; unparsable ones are skipped.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(e) = apply_env_overrides(&mut config) {
            debug!(error = %e, "Ignoring environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.config_path.as_ref().ok_or(ConfigError::NoPath)?;
        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    ///
    /// On error the previous configuration is kept.
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            let mut config = load_from_file(path)?;
            apply_env_overrides(&mut config)?;
            config.validate()?;
            self.config = config;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        debug!(path = %path.display(), "{} points to a missing file", CONFIG_PATH_ENV);
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "timed-serial").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::read(path.to_path_buf(), e))?;
    debug!(path = %path.display(), "Loaded configuration file");

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read and parse `TIMED_SERIAL_<key>` if it is set.
fn env_value<T: FromStr>(key: &str, what: &str) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    match std::env::var(&var) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("Invalid {}", what))),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `TIMED_SERIAL_<SECTION>_<KEY>`
/// For example:
/// - `TIMED_SERIAL_SERIAL_DEFAULT_BAUD=9600`
/// - `TIMED_SERIAL_SERIAL_READ_TIMEOUT_MS=500`
/// - `TIMED_SERIAL_LOGGING_FORMAT=json`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let serial = &mut config.serial;
    if let Some(val) = env_value("SERIAL_DEFAULT_BAUD", "baud rate")? {
        serial.default_baud = val;
    }
    if let Some(val) = env_value("SERIAL_READ_TIMEOUT_MS", "timeout")? {
        serial.read_timeout_ms = val;
    }
    if let Some(val) = env_value("SERIAL_WRITE_TIMEOUT_MS", "timeout")? {
        serial.write_timeout_ms = val;
    }
    if let Some(val) = env_value("SERIAL_POLL_INTERVAL_MS", "poll interval")? {
        serial.poll_interval_ms = val;
    }
    if let Some(val) = env_value("SERIAL_NATIVE_POLL_SLICE_MS", "poll slice")? {
        serial.native_poll_slice_ms = val;
    }

    let logging = &mut config.logging;
    if let Some(val) = env_value::<String>("LOGGING_LEVEL", "log level")? {
        logging.level = val;
    }
    if let Some(val) = env_value("LOGGING_FORMAT", "log format")? {
        logging.format = val;
    }

    Ok(())
}
