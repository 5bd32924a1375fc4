//! Index error types.

use thiserror::Error;

/// Errors from the detection index.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The index file could not be opened or created.
    #[error("cannot open index: {0}")]
    Open(String),

    /// The schema could not be brought up to date.
    #[error("index migration failed: {0}")]
    Migration(String),

    /// A record could not be encoded into its columns.
    #[error("cannot store record: {0}")]
    Encode(String),

    /// A stored row does not map back to a record.
    #[error("corrupt index row: {0}")]
    Decode(String),

    /// Query or transaction failure reported by `SQLite`.
    #[error("index query failed: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
