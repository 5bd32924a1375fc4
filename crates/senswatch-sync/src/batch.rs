//! Batch mode: scan a known set of files and rebuild the index.

use crate::error::{Result, SyncError};
use senswatch_core::PathsConfig;
use senswatch_detect::{DetectError, DetectionRecord, PathScanner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::{debug, info, warn};

/// One entry of the filesystem indexer's `file_index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute file path
    pub path: PathBuf,
    /// Size in bytes when indexed
    #[serde(default)]
    pub size: u64,
    /// Modification time as Unix seconds
    #[serde(default)]
    pub modified_time: f64,
}

/// File list produced by the filesystem indexer.
///
/// Other top-level keys (such as the indexer's inverted index) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileIndex {
    /// Entries keyed by path
    #[serde(default)]
    pub file_dict: BTreeMap<String, FileEntry>,
}

impl FileIndex {
    /// Load and parse a file index.
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        serde_json::from_slice(&data).map_err(|source| SyncError::FileIndex {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Indexed file paths, sorted and deduplicated.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .file_dict
            .values()
            .map(|entry| entry.path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

/// Regular files below `root`, at most `max_depth` directory levels deep.
/// Symlinks are never followed. The result is sorted.
pub async fn walk_directory(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut files = walk_directory_impl(root, max_depth).await;
    files.sort();
    files
}

fn walk_directory_impl(
    dir: &Path,
    max_depth: usize,
) -> Pin<Box<dyn Future<Output = Vec<PathBuf>> + Send + '_>> {
    Box::pin(async move {
        if max_depth == 0 {
            debug!("Max depth reached, skipping: {}", dir.display());
            return Vec::new();
        }

        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read directory {}: {}", dir.display(), e);
                return files;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    debug!("Failed to read metadata for {}: {}", path.display(), e);
                    continue;
                }
            };

            if metadata.is_symlink() {
                debug!("Skipping symlink: {}", path.display());
            } else if metadata.is_dir() {
                files.append(&mut walk_directory_impl(&path, max_depth - 1).await);
            } else if metadata.is_file() {
                files.push(path);
            }
        }

        files
    })
}

/// Files to scan in batch mode: the file index if it exists, otherwise a
/// walk of every scan root.
pub async fn collect_targets(paths: &PathsConfig, max_depth: usize) -> Result<Vec<PathBuf>> {
    if tokio::fs::try_exists(&paths.file_index).await? {
        let index = FileIndex::load(&paths.file_index).await?;
        info!(
            "Loaded {} files from {}",
            index.file_dict.len(),
            paths.file_index.display()
        );
        return Ok(index.paths());
    }

    let mut targets = Vec::new();
    for root in &paths.scan_roots {
        targets.extend(walk_directory(root, max_depth).await);
    }
    targets.sort();
    targets.dedup();
    info!(
        "Collected {} files from {} scan roots",
        targets.len(),
        paths.scan_roots.len()
    );
    Ok(targets)
}

/// Scan every path and return the records with findings, sorted by path.
///
/// Per-file failures are logged and skipped.
pub async fn run_batch<S>(scanner: &S, paths: &[PathBuf]) -> Vec<DetectionRecord>
where
    S: PathScanner + ?Sized,
{
    let mut records = Vec::new();
    let mut failed = 0usize;

    for path in paths {
        match scanner.scan(path).await {
            Ok(record) if record.has_findings() => records.push(record),
            Ok(_) => {}
            Err(DetectError::Skipped(_)) => debug!("Skipping {}: file type", path.display()),
            Err(e) => {
                warn!("Failed to scan {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    records.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    info!(
        "Batch scanned {} files: {} with findings, {} failed",
        paths.len(),
        records.len(),
        failed
    );
    records
}

/// Write records as a pretty-printed JSON array.
pub async fn write_json_export(path: &Path, records: &[DetectionRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    tokio::fs::write(path, json).await?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
