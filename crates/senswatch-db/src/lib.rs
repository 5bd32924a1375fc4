//! SensWatch Database Layer
//!
//! Stores one [`DetectionRecord`] per file path in a `SQLite` index
//! (`output.db`). Uses `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use senswatch_db::Database;
//!
//! let db = Database::new("output.db").await?;
//! db.run_migrations().await?;
//! let records = db.list_records().await?;
//! ```
//!
//! The free functions in [`detection_results`] take a `SqliteConnection`
//! so callers can group several of them in one transaction.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod detection_results;
pub mod error;
pub mod migrations;

pub use connection::IndexPool;
pub use error::{DatabaseError, Result};

use senswatch_detect::DetectionRecord;
use std::path::Path;

/// High-level handle to the detection index.
#[derive(Debug, Clone)]
pub struct Database {
    pool: IndexPool,
}

impl Database {
    /// Open (or create) the index at `path` (`:memory:` for an in-memory one).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = IndexPool::new(path).await?;
        Ok(Self { pool })
    }

    /// Open the index at `path` and bring its schema up to date.
    ///
    /// # Errors
    /// Returns `DatabaseError` if opening or migrating fails.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::new(path).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Begin a transaction on a pooled connection.
    ///
    /// # Errors
    /// Returns `DatabaseError` if no connection can be acquired.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Sqlite>> {
        Ok(self.pool.pool().begin().await?)
    }

    /// Fetch the record stored for a path.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the query or decoding fails.
    pub async fn get_record(&self, file_path: &str) -> Result<Option<DetectionRecord>> {
        let mut conn = self.pool.pool().acquire().await?;
        detection_results::get_record(&mut *conn, file_path).await
    }

    /// All records, ordered by path.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the query or decoding fails.
    pub async fn list_records(&self) -> Result<Vec<DetectionRecord>> {
        let mut conn = self.pool.pool().acquire().await?;
        detection_results::list_records(&mut *conn).await
    }

    /// Replace the whole index with `records` in a single transaction.
    ///
    /// # Errors
    /// Returns `DatabaseError` if any write fails; the index is left unchanged.
    pub async fn replace_all(&self, records: &[DetectionRecord]) -> Result<()> {
        let mut tx = self.begin().await?;
        detection_results::replace_all(&mut *tx, records).await?;
        tx.commit().await?;

        tracing::info!("Index replaced with {} records", records.len());
        Ok(())
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use senswatch_detect::{MatchTable, RuleSet};

    fn record(path: &str) -> DetectionRecord {
        let mut matches = MatchTable::new();
        matches.push("email", "a@b.com".to_string());
        let detect_time = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .expect("valid timestamp");
        DetectionRecord::build(
            Path::new(path),
            matches,
            "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            detect_time,
            RuleSet::builtin(),
        )
    }

    #[tokio::test]
    async fn test_database_migrations() {
        let db = Database::new(":memory:").await.expect("create database");

        assert_eq!(db.get_schema_version().await.expect("get version"), 0);
        db.run_migrations().await.expect("run migrations");
        assert_eq!(db.get_schema_version().await.expect("get version"), 1);
    }

    #[tokio::test]
    async fn test_database_schema() {
        let db = Database::open(":memory:").await.expect("open database");

        let columns: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM pragma_table_info('detection_results') ORDER BY cid",
        )
        .fetch_all(db.pool())
        .await
        .expect("query columns");

        assert_eq!(
            columns,
            vec![
                "id",
                "file_path",
                "file_name",
                "md5",
                "detect_time",
                "match_counts",
                "matches",
                "total_sensitive_count",
                "rule_numbers",
                "created_at"
            ]
        );
    }

    #[tokio::test]
    async fn test_replace_all_and_list() {
        let db = Database::open(":memory:").await.expect("open database");

        db.replace_all(&[record("/b.txt"), record("/a.txt")])
            .await
            .expect("replace");
        db.replace_all(&[record("/c.txt")]).await.expect("replace again");

        let records = db.list_records().await.expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_path, "/c.txt");
        assert_eq!(records[0].rule_numbers, vec![6]);

        assert!(db.get_record("/a.txt").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_database_close() {
        let db = Database::new(":memory:").await.expect("create database");
        db.close().await;
    }
}
