//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (applied via [`Config::apply`])
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `--config <path>` if given (must exist)
//! 2. `$GUESTBOOK_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/guestbook/config.toml`
//! 4. `~/.guestbook/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use guestbook::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("storing images in {}", config.storage_dir().display());
//! println!("flushing every {:?}", config.flush_interval());
//! ```

pub mod schema;

pub use schema::FileConfig;

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::StoragePaths;
use crate::persist::RecoveryPolicy;

/// Default listen address.
pub const DEFAULT_LISTEN: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8089);

/// Default seconds between background flushes.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration.
///
/// Accessor methods apply defaults for anything left unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Values from the config file, with CLI overrides applied
    pub file: FileConfig,
    /// Path the file was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` is missing, or if a config file exists
    /// but cannot be parsed or holds invalid values. A missing default
    /// config file is not an error (defaults are used).
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config(),
        };

        let config = match path {
            Some(path) => Config {
                file: Self::read_config(&path)?,
                loaded_from: Some(path),
            },
            None => Config::default(),
        };

        config.file.validate()?;
        Ok(config)
    }

    /// First existing config file in the default search order.
    fn find_config() -> Option<PathBuf> {
        // 1. Check $GUESTBOOK_CONFIG
        if let Ok(path) = std::env::var("GUESTBOOK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/guestbook/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("guestbook/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.guestbook/config.toml
        dirs::home_dir()
            .map(|home| home.join(".guestbook/config.toml"))
            .filter(|path| path.exists())
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply overrides (from CLI flags) on top of the loaded values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if an override is invalid.
    pub fn apply(mut self, overrides: FileConfig) -> Result<Config, ConfigError> {
        let FileConfig {
            storage_dir,
            listen,
            flush_interval_secs,
            recovery,
        } = overrides;

        if storage_dir.is_some() {
            self.file.storage_dir = storage_dir;
        }
        if listen.is_some() {
            self.file.listen = listen;
        }
        if flush_interval_secs.is_some() {
            self.file.flush_interval_secs = flush_interval_secs;
        }
        if recovery.is_some() {
            self.file.recovery = recovery;
        }

        self.file.validate()?;
        Ok(self)
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Storage directory.
    ///
    /// Defaults to `~/.guestbook/data`.
    pub fn storage_dir(&self) -> PathBuf {
        self.file
            .storage_dir
            .clone()
            .unwrap_or_else(StoragePaths::default_root)
    }

    /// Listen address.
    ///
    /// Defaults to `127.0.0.1:8089`.
    pub fn listen(&self) -> SocketAddr {
        self.file
            .listen
            .as_deref()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or(DEFAULT_LISTEN)
    }

    /// Interval between background flushes.
    ///
    /// Defaults to one minute.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(
            self.file
                .flush_interval_secs
                .unwrap_or(DEFAULT_FLUSH_INTERVAL_SECS),
        )
    }

    /// Recovery policy for corrupt images.
    ///
    /// Defaults to strict.
    pub fn recovery(&self) -> RecoveryPolicy {
        self.file.recovery.unwrap_or_default()
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
