//! Detection result operations.
//!
//! CRUD for the `detection_results` table. Every function takes a
//! `SqliteConnection`, so callers can run it on a pooled connection or
//! inside a transaction (`&mut *tx`).

use crate::error::{DatabaseError, Result};
use senswatch_detect::record::{join_rule_numbers, parse_rule_numbers};
use senswatch_detect::DetectionRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::path::Path;

const SELECT_COLUMNS: &str = "SELECT file_path, file_name, md5, detect_time, match_counts, matches, \
     total_sensitive_count, rule_numbers FROM detection_results";

fn decode_row(row: &SqliteRow) -> Result<DetectionRecord> {
    let file_path: String = row.try_get("file_path")?;
    let match_counts: String = row.try_get("match_counts")?;
    let matches: String = row.try_get("matches")?;
    let total: i64 = row.try_get("total_sensitive_count")?;
    let rule_numbers: String = row.try_get("rule_numbers")?;

    Ok(DetectionRecord {
        file_name: row.try_get("file_name")?,
        md5: row.try_get("md5")?,
        detect_time: row.try_get("detect_time")?,
        match_counts: serde_json::from_str(&match_counts).map_err(|e| {
            DatabaseError::Decode(format!("match_counts of {file_path}: {e}"))
        })?,
        matches: serde_json::from_str(&matches)
            .map_err(|e| DatabaseError::Decode(format!("matches of {file_path}: {e}")))?,
        total_sensitive_count: usize::try_from(total).map_err(|_| {
            DatabaseError::Decode(format!("negative total_sensitive_count for {file_path}"))
        })?,
        rule_numbers: parse_rule_numbers(&rule_numbers),
        file_path,
    })
}

/// Fetch the record stored for a path.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a column cannot be decoded.
pub async fn get_record(
    conn: &mut SqliteConnection,
    file_path: &str,
) -> Result<Option<DetectionRecord>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE file_path = ?"))
        .bind(file_path)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(decode_row).transpose()
}

/// Whether a record exists for a path.
///
/// # Errors
/// Returns `DatabaseError` if the query fails.
pub async fn record_exists(conn: &mut SqliteConnection, file_path: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM detection_results WHERE file_path = ?")
            .bind(file_path)
            .fetch_one(&mut *conn)
            .await?;

    Ok(count > 0)
}

/// Insert a record, or fully replace the one stored under the same path.
///
/// # Errors
/// Returns `DatabaseError` if serialization or the write fails.
pub async fn upsert_record(conn: &mut SqliteConnection, record: &DetectionRecord) -> Result<()> {
    let encode = |column: &str, reason: String| {
        DatabaseError::Encode(format!("{column} of {}: {reason}", record.file_path))
    };
    let match_counts = serde_json::to_string(&record.match_counts)
        .map_err(|e| encode("match_counts", e.to_string()))?;
    let matches =
        serde_json::to_string(&record.matches).map_err(|e| encode("matches", e.to_string()))?;
    let total = i64::try_from(record.total_sensitive_count)
        .map_err(|e| encode("total_sensitive_count", e.to_string()))?;

    sqlx::query(
        "INSERT INTO detection_results
             (file_path, file_name, md5, detect_time, match_counts, matches, total_sensitive_count, rule_numbers)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(file_path) DO UPDATE SET
             file_name = excluded.file_name,
             md5 = excluded.md5,
             detect_time = excluded.detect_time,
             match_counts = excluded.match_counts,
             matches = excluded.matches,
             total_sensitive_count = excluded.total_sensitive_count,
             rule_numbers = excluded.rule_numbers",
    )
    .bind(&record.file_path)
    .bind(&record.file_name)
    .bind(&record.md5)
    .bind(&record.detect_time)
    .bind(&match_counts)
    .bind(&matches)
    .bind(total)
    .bind(join_rule_numbers(&record.rule_numbers))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete the record for a path. Returns whether one existed.
///
/// # Errors
/// Returns `DatabaseError` if the delete fails.
pub async fn delete_record(conn: &mut SqliteConnection, file_path: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM detection_results WHERE file_path = ?")
        .bind(file_path)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Re-key a record from `old_path` to `new_path`, keeping its match data.
/// Returns whether a record was moved.
///
/// Any record already stored under `new_path` must be deleted first.
///
/// # Errors
/// Returns `DatabaseError` if the update fails (including a conflict on
/// `new_path`).
pub async fn rename_record(
    conn: &mut SqliteConnection,
    old_path: &str,
    new_path: &str,
) -> Result<bool> {
    let new_name = Path::new(new_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result =
        sqlx::query("UPDATE detection_results SET file_path = ?, file_name = ? WHERE file_path = ?")
            .bind(new_path)
            .bind(&new_name)
            .bind(old_path)
            .execute(&mut *conn)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// All records, ordered by path.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a row cannot be decoded.
pub async fn list_records(conn: &mut SqliteConnection) -> Result<Vec<DetectionRecord>> {
    let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY file_path"))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(decode_row).collect()
}

/// Number of stored records.
///
/// # Errors
/// Returns `DatabaseError` if the query fails.
pub async fn count_records(conn: &mut SqliteConnection) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM detection_results")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Replace the whole table content with `records`.
///
/// Run inside a transaction to make the swap atomic.
///
/// # Errors
/// Returns `DatabaseError` if any statement fails.
pub async fn replace_all(conn: &mut SqliteConnection, records: &[DetectionRecord]) -> Result<()> {
    sqlx::query("DELETE FROM detection_results")
        .execute(&mut *conn)
        .await?;

    for record in records {
        upsert_record(conn, record).await?;
    }

    Ok(())
}
