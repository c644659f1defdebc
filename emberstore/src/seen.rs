use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::StoreError;

/// Entries older than this may be pruned.
pub const RETENTION: Duration = Duration::days(30);

/// `has_seen(msg_id) -> bool`
pub(crate) async fn has_seen(pool: &SqlitePool, msg_id: Uuid) -> Result<bool, StoreError> {
    let row: Option<i64> = sqlx::query_scalar("SELECT 1 FROM seen_id WHERE msg_id = ?")
    .bind(msg_id.to_string())
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// `mark_seen(msg_id)`
pub(crate) async fn mark_seen(pool: &SqlitePool, msg_id: Uuid) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO seen_id (msg_id, received_at) VALUES (?, ?)")
    .bind(msg_id.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes seen-id entries older than the retention window. Returns the
/// number of rows pruned so the scheduler can log it.
pub(crate) async fn gc_older_than(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let cutoff = now - RETENTION;
    let result = sqlx::query("DELETE FROM seen_id WHERE received_at < ?")
    .bind(cutoff.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
