//! SensWatch Core - Foundation crate for the SensWatch detection engine.
//!
//! This crate provides the configuration model shared by the detector,
//! index and synchronization crates.
//!
//! # Modules
//!
//! - [`error`] - Configuration errors
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//!
//! # Example
//!
//! ```rust
//! use senswatch_core::AppConfig;
//!
//! let config = AppConfig::default();
//! assert_eq!(config.watch.poll_interval_secs, 3);
//! assert!(config.scan.skip_extensions.iter().any(|ext| ext == "exe"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{AppConfig, ExtractorConfig, PathsConfig, ScanConfig, WatchConfig};
pub use error::{ConfigError, ConfigResult};
