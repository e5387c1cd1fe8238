//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Values are validated after parsing: the flush interval must be positive
//! and the listen address must parse as a socket address.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::persist::RecoveryPolicy;

/// Guestbook configuration file.
///
/// # Example
///
/// ```toml
/// storage_dir = "/var/lib/guestbook"
/// listen = "0.0.0.0:8089"
/// flush_interval_secs = 60
/// recovery = "strict"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Directory holding durable images
    pub storage_dir: Option<PathBuf>,

    /// Address the HTTP front binds to
    pub listen: Option<String>,

    /// Seconds between background flushes
    pub flush_interval_secs: Option<u64>,

    /// What to do when the newest image is corrupt
    pub recovery: Option<RecoveryPolicy>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "flush_interval_secs must be greater than zero".into(),
            ));
        }

        if let Some(listen) = &self.listen {
            listen.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue(format!("invalid listen address '{}': {}", listen, e))
            })?;
        }

        Ok(())
    }
}
