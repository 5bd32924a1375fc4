//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or validating `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The platform exposes no home or config directory.
    #[error("no platform config directory available")]
    NoConfigDir,

    /// An explicitly requested config file does not exist.
    #[error("config file not found at {}", path.display())]
    NotFound {
        /// Requested path
        path: PathBuf,
    },

    /// The file is not valid TOML for [`crate::AppConfig`].
    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Reading the file failed.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field name, e.g. `watch.poll_interval_secs`
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
