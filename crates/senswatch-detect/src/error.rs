//! Error types for detection operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while scanning a single file.
///
/// All variants are per-file: callers log them and continue with the next
/// path. Rejected candidates are not errors.
#[derive(Error, Debug)]
pub enum DetectError {
    /// Reading the file or its text stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File exceeds the configured size limit
    #[error("file too large: {path} ({size} bytes, limit {limit})")]
    TooLarge {
        /// File that was skipped
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// File extension is on the skip list
    #[error("file type not scanned: {0}")]
    Skipped(PathBuf),

    /// Document text could not be extracted
    #[error("extraction failed for {path}: {reason}")]
    Extract {
        /// Document path
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Malformed document archive
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Entity recognizer failure
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// Background task failed to complete
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias for detection operations.
pub type Result<T> = std::result::Result<T, DetectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DetectError::TooLarge {
            path: PathBuf::from("/tmp/big.log"),
            size: 200,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "file too large: /tmp/big.log (200 bytes, limit 100)"
        );
    }
}
