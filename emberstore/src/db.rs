use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::StoreError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Opens (creating if necessary) the relational local-store file and runs
/// pending migrations.
///
/// A single pool is shared by all store operations; write serialization
/// is enforced above the pool by `Store`, not by sqlite's own
/// locking, so that the dedup check-then-mark in `has_seen`/`mark_seen` can
/// be made atomic together.
pub async fn open(path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::new()
    .filename(path)
    .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect_with(options)
    .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// A single shared in-memory connection, for tests. sqlite's `:memory:`
/// database is private per-connection, so this pool is deliberately capped
/// at one connection — a larger pool would silently hand out empty,
/// unrelated databases to concurrent callers.
pub async fn open_in_memory() -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}
