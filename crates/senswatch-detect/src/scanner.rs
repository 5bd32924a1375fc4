//! Per-file scan pipeline: extract, match, hash, build.

use crate::error::{DetectError, Result};
use crate::extractor::{is_scannable, ExtractorSet};
use crate::hash::md5_file;
use crate::matcher::StreamMatcher;
use crate::recognizer::{CommandRecognizer, EntityRecognizer};
use crate::record::{detect_time_now, DetectionRecord};
use crate::rules::{RuleSet, ADDRESS_NAME};
use async_trait::async_trait;
use senswatch_core::{AppConfig, ScanConfig};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Anything that can turn a path into a detection record.
#[async_trait]
pub trait PathScanner: Send + Sync {
    /// Scan one file. The record may have zero findings.
    async fn scan(&self, path: &Path) -> Result<DetectionRecord>;
}

/// Scans files with the built-in rules.
pub struct FileScanner {
    rules: &'static RuleSet,
    extractors: ExtractorSet,
    recognizer: Option<Box<dyn EntityRecognizer>>,
    skip_extensions: Vec<String>,
    max_file_size: u64,
    read_chunk_bytes: usize,
    window_bytes: usize,
}

impl FileScanner {
    /// Plain text scanner with the given scan settings.
    #[must_use]
    pub fn new(scan: &ScanConfig) -> Self {
        Self {
            rules: RuleSet::builtin(),
            extractors: ExtractorSet::new(),
            recognizer: None,
            skip_extensions: scan.skip_extensions.clone(),
            max_file_size: scan.max_file_size_mb.saturating_mul(1024 * 1024),
            read_chunk_bytes: scan.read_chunk_bytes.max(1),
            window_bytes: scan.window_bytes,
        }
    }

    /// Scanner with the configured extractors and recognizer.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let scanner =
            Self::new(&config.scan).with_extractors(ExtractorSet::from_config(&config.extractors));
        match CommandRecognizer::from_config(&config.extractors) {
            Some(recognizer) => scanner.with_recognizer(Box::new(recognizer)),
            None => scanner,
        }
    }

    /// Replace the extractor set.
    #[must_use]
    pub fn with_extractors(mut self, extractors: ExtractorSet) -> Self {
        self.extractors = extractors;
        self
    }

    /// Enable the `address_name` rule.
    #[must_use]
    pub fn with_recognizer(mut self, recognizer: Box<dyn EntityRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Whether the file's extension is eligible for scanning.
    #[must_use]
    pub fn is_scannable(&self, path: &Path) -> bool {
        is_scannable(path, &self.skip_extensions)
    }

    /// Scan a single file.
    pub async fn scan_file(&self, path: &Path) -> Result<DetectionRecord> {
        if !self.is_scannable(path) {
            return Err(DetectError::Skipped(path.to_path_buf()));
        }

        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > self.max_file_size {
            return Err(DetectError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: self.max_file_size,
            });
        }

        let mut stream = self.extractors.open(path).await?;
        let mut matcher = StreamMatcher::new(self.rules, self.window_bytes);
        if self.recognizer.is_some() {
            matcher = matcher.with_settled_text();
        }

        let mut entities = Vec::new();
        let mut chunk = vec![0u8; self.read_chunk_bytes];
        loop {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            matcher.feed(&chunk[..read]);
            self.recognize_settled(&mut matcher, &mut entities).await;
        }
        matcher.finish();
        self.recognize_settled(&mut matcher, &mut entities).await;

        let mut matches = matcher.into_table();
        matches.extend_rule(ADDRESS_NAME, entities);

        let md5 = md5_file(path).await?;
        let record = DetectionRecord::build(path, matches, md5, detect_time_now(), self.rules);
        debug!(
            "Scanned {}: {} matches",
            path.display(),
            record.total_sensitive_count
        );
        Ok(record)
    }

    async fn recognize_settled(&self, matcher: &mut StreamMatcher<'_>, entities: &mut Vec<String>) {
        let Some(recognizer) = self.recognizer.as_deref() else {
            return;
        };
        for segment in matcher.take_settled_text() {
            match recognizer.recognize(&segment).await {
                Ok(found) => entities.extend(found),
                Err(e) => warn!("Address/name recognition failed: {}", e),
            }
        }
    }
}

#[async_trait]
impl PathScanner for FileScanner {
    async fn scan(&self, path: &Path) -> Result<DetectionRecord> {
        self.scan_file(path).await
    }
}

impl fmt::Debug for FileScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileScanner")
            .field("extractors", &self.extractors)
            .field("recognizer", &self.recognizer.is_some())
            .field("max_file_size", &self.max_file_size)
            .field("window_bytes", &self.window_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedRecognizer {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl EntityRecognizer for FixedRecognizer {
        async fn recognize(&self, _text: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DetectError::Recognizer("offline".to_string()))
            } else {
                Ok(vec!["张三".to_string()])
            }
        }
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    #[tokio::test]
    async fn test_scan_file_builds_record() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = write(
            &temp_dir,
            "a.txt",
            "id 110101199003074514 card 4111111111111112\n",
        );

        let scanner = FileScanner::new(&ScanConfig::default());
        let record = scanner.scan_file(&path).await.unwrap();

        assert_eq!(record.file_name, "a.txt");
        assert_eq!(record.match_counts.len(), 1);
        assert_eq!(record.match_counts.get("id_number"), Some(&1));
        assert_eq!(record.total_sensitive_count, 1);
        assert_eq!(record.rule_numbers_joined(), "8");
        assert_eq!(record.md5.len(), 32);
    }

    #[tokio::test]
    async fn test_skipped_and_oversized() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let image = write(&temp_dir, "photo.png", "13812345678");
        let text = write(&temp_dir, "big.txt", "13812345678");

        let scanner = FileScanner::new(&ScanConfig::default());
        assert!(matches!(
            scanner.scan_file(&image).await,
            Err(DetectError::Skipped(_))
        ));

        let tiny = ScanConfig {
            max_file_size_mb: 0,
            ..ScanConfig::default()
        };
        assert!(matches!(
            FileScanner::new(&tiny).scan_file(&text).await,
            Err(DetectError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_relative_path_is_stored_absolute() {
        let file = tempfile::Builder::new()
            .prefix("relative-scan-")
            .suffix(".txt")
            .tempfile_in(".")
            .expect("create file in working directory");
        std::fs::write(file.path(), "电话 13812345678\n").expect("write fixture");
        let relative = Path::new(file.path().file_name().expect("file name"));

        let scanner = FileScanner::new(&ScanConfig::default());
        let record = scanner.scan_file(relative).await.expect("scan");

        let expected = std::env::current_dir()
            .expect("working directory")
            .join(relative);
        assert!(Path::new(&record.file_path).is_absolute());
        assert_eq!(record.file_path, expected.to_string_lossy());
        assert_eq!(record.matches.get("phone"), ["13812345678"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let scanner = FileScanner::new(&ScanConfig::default());
        let result = scanner.scan_file(Path::new("/nonexistent/a.txt")).await;
        assert!(matches!(result, Err(DetectError::Io(_))));
    }

    #[tokio::test]
    async fn test_recognizer_adds_address_name() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = write(&temp_dir, "b.txt", "张三 13812345678");
        let calls = Arc::new(AtomicUsize::new(0));

        let scanner = FileScanner::new(&ScanConfig::default()).with_recognizer(Box::new(
            FixedRecognizer {
                calls: Arc::clone(&calls),
                fail: false,
            },
        ));
        let record = scanner.scan_file(&path).await.unwrap();

        // Small files are recognized once, on the full text.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(record.matches.get(ADDRESS_NAME), ["张三"]);
        assert_eq!(record.rule_numbers, vec![1, 19]);
    }

    #[tokio::test]
    async fn test_recognizer_failure_keeps_pattern_matches() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = write(&temp_dir, "c.txt", "13812345678");

        let scanner = FileScanner::new(&ScanConfig::default()).with_recognizer(Box::new(
            FixedRecognizer {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            },
        ));
        let record = scanner.scan_file(&path).await.unwrap();
        assert_eq!(record.match_counts.get("phone"), Some(&1));
        assert!(record.matches.get(ADDRESS_NAME).is_empty());
    }

    #[tokio::test]
    async fn test_windowed_file_scan() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let content = "mail bob@corp.cn 13812345678\n".repeat(2000);
        let path = write(&temp_dir, "large.log", &content);

        let config = ScanConfig {
            window_bytes: 4096,
            ..ScanConfig::default()
        };
        let record = FileScanner::new(&config).scan_file(&path).await.unwrap();
        assert_eq!(record.match_counts.get("phone"), Some(&2000));
        assert_eq!(record.match_counts.get("email"), Some(&2000));
    }
}
