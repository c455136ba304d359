//! Database access for the indexed store backend

use msp_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Opens (or creates) the content index database and its tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to content index: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the media_entries table and its lookup index if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            volume TEXT NOT NULL,
            category TEXT NOT NULL,
            display_name TEXT NOT NULL,
            relative_path TEXT NOT NULL,
            is_pending INTEGER NOT NULL DEFAULT 0,
            data_path TEXT NOT NULL DEFAULT '',
            date_added INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Lookup index only; identity is not a uniqueness constraint
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_media_entries_identity
        ON media_entries (volume, category, display_name, relative_path)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Content index tables initialized (media_entries)");

    Ok(())
}
