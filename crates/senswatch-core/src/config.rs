//! Configuration management for SensWatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/senswatch/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Input, output and index locations
    pub paths: PathsConfig,
    /// Detector behavior
    pub scan: ScanConfig,
    /// Change log polling
    pub watch: WatchConfig,
    /// External extraction and recognition commands
    pub extractors: ExtractorConfig,
}

impl AppConfig {
    /// Load configuration from the platform config directory, falling back to
    /// defaults if no file exists.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML or fail validation
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SENSWATCH_CHANGE_LOG`: Override the change log path
    /// - `SENSWATCH_INDEX_DB`: Override the SQLite index path
    /// - `SENSWATCH_POLL_INTERVAL_SECS`: Override the live-mode poll interval
    /// - `SENSWATCH_LIVE`: Enable or disable live mode (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup function.
    ///
    /// Unparseable values are ignored and the configured value is kept.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SENSWATCH_CHANGE_LOG") {
            tracing::debug!("Override paths.change_log from env: {}", val);
            self.paths.change_log = PathBuf::from(val);
        }

        if let Some(val) = lookup("SENSWATCH_INDEX_DB") {
            tracing::debug!("Override paths.index_db from env: {}", val);
            self.paths.index_db = PathBuf::from(val);
        }

        if let Some(val) = lookup("SENSWATCH_POLL_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.watch.poll_interval_secs = secs;
                tracing::debug!("Override watch.poll_interval_secs from env: {}", secs);
            }
        }

        if let Some(val) = lookup("SENSWATCH_LIVE") {
            if let Ok(live) = val.parse() {
                self.watch.live = live;
                tracing::debug!("Override watch.live from env: {}", live);
            }
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.watch.poll_interval_secs == 0 {
            return Err(invalid("watch.poll_interval_secs", "must be greater than zero"));
        }
        if self.scan.read_chunk_bytes == 0 {
            return Err(invalid("scan.read_chunk_bytes", "must be greater than zero"));
        }
        if self.scan.window_bytes < self.scan.read_chunk_bytes {
            return Err(invalid(
                "scan.window_bytes",
                "must be at least scan.read_chunk_bytes",
            ));
        }
        for (field, marker) in [
            ("watch.modify_marker", &self.watch.modify_marker),
            ("watch.create_marker", &self.watch.create_marker),
            ("watch.move_marker", &self.watch.move_marker),
            ("watch.delete_marker", &self.watch.delete_marker),
            ("watch.move_separator", &self.watch.move_separator),
        ] {
            if marker.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/senswatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "senswatch", "senswatch").ok_or(ConfigError::NoConfigDir)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Input, output and index locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// File index JSON produced by the filesystem indexer (`file_dict` map)
    pub file_index: PathBuf,
    /// Batch JSON export of detection records
    pub output_json: PathBuf,
    /// SQLite detection index
    pub index_db: PathBuf,
    /// Append-only change log written by the filesystem watcher
    pub change_log: PathBuf,
    /// Directories walked in batch mode when `file_index` does not exist
    pub scan_roots: Vec<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            file_index: PathBuf::from("file_index.json"),
            output_json: PathBuf::from("output.json"),
            index_db: PathBuf::from("output.db"),
            change_log: PathBuf::from("simple_everything.log"),
            scan_roots: Vec::new(),
        }
    }
}

/// Detector behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Lower-case file extensions (without dot) that are never scanned
    pub skip_extensions: Vec<String>,
    /// Decoded text buffered before a windowed scan kicks in
    pub window_bytes: usize,
    /// Size of each read from a text stream
    pub read_chunk_bytes: usize,
    /// Files larger than this are skipped
    pub max_file_size_mb: u64,
    /// Maximum directory depth for batch directory walks
    pub max_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            skip_extensions: [
                "jpg", "jpeg", "png", "gif", "bmp", "ico", "svg", "webp", "mp3", "mp4", "avi",
                "mov", "wmv", "zip", "rar", "7z", "tar", "gz", "msi", "exe", "dll", "so", "dylib",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            window_bytes: 1024 * 1024,
            read_chunk_bytes: 4096,
            max_file_size_mb: 100,
            max_depth: 10,
        }
    }
}

/// Change log polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Keep polling the change log after the batch pass
    pub live: bool,
    /// Sleep between reconciliation cycles
    pub poll_interval_secs: u64,
    /// Marker preceding the path of a modified file
    pub modify_marker: String,
    /// Marker preceding the path of a newly created file
    pub create_marker: String,
    /// Marker preceding `old -> new` for a moved or renamed file
    pub move_marker: String,
    /// Marker preceding the path of a deleted file
    pub delete_marker: String,
    /// Separator between the old and new path of a move
    pub move_separator: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            live: true,
            poll_interval_secs: 3,
            modify_marker: "文件修改事件: ".to_string(),
            create_marker: "文件创建事件: ".to_string(),
            move_marker: "文件移动/重命名事件: ".to_string(),
            delete_marker: "文件删除事件: ".to_string(),
            move_separator: " -> ".to_string(),
        }
    }
}

/// External command settings. An empty command disables the capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// PDF to text command; `{input}` is replaced by the file path,
    /// the text is read from stdout (e.g. `["pdftotext", "{input}", "-"]`)
    pub pdf_command: Vec<String>,
    /// Address/name recognizer; the text file path is appended as last argument
    pub recognizer_command: Vec<String>,
}
