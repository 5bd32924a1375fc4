//! Embedded schema migrations for the detection index.

use crate::error::{DatabaseError, Result};
use sqlx::migrate::Migrator;
use sqlx::{Pool, Sqlite};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Bring the index schema up to date. Already applied migrations are skipped.
///
/// # Errors
/// Returns `DatabaseError::Migration` if a migration fails.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("index schema upgrade failed: {e}")))?;

    tracing::debug!(
        "Index schema at version {}",
        get_schema_version(pool).await?
    );
    Ok(())
}

/// Highest successfully applied migration, 0 on a fresh database.
///
/// # Errors
/// Returns `DatabaseError` if the bookkeeping table cannot be queried.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    if !tracked {
        return Ok(0);
    }

    let version: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations WHERE success = 1",
    )
    .fetch_one(pool)
    .await?;
    Ok(version)
}
