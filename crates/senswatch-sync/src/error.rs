//! Synchronization error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from tailing the change log, reconciling or batch indexing.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The change log could not be opened or read.
    #[error("change log {path}: {source}")]
    ChangeLog {
        /// Log file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A reconciliation phase failed and its transaction was rolled back.
    #[error("transaction failed during {phase}: {source}")]
    Transaction {
        /// Which phase was running
        phase: &'static str,
        /// Underlying index error
        #[source]
        source: senswatch_db::DatabaseError,
    },

    /// The file index JSON could not be parsed.
    #[error("invalid file index {path}: {source}")]
    FileIndex {
        /// File index path
        path: PathBuf,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// Index access outside a reconciliation transaction.
    #[error("index error: {0}")]
    Database(#[from] senswatch_db::DatabaseError),

    /// JSON export serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other I/O failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub(crate) fn transaction(phase: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| Self::Transaction {
            phase,
            source: senswatch_db::DatabaseError::Sqlx(e),
        }
    }

    pub(crate) fn in_phase(phase: &'static str) -> impl FnOnce(senswatch_db::DatabaseError) -> Self {
        move |source| Self::Transaction { phase, source }
    }
}

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
