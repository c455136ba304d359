//! SQLite-indexed store with pending visibility
//!
//! Rows live in `media_entries`; bytes live under the store root at
//! `<volume>/<relative_path>/<id>_<display_name>`. A row with
//! `is_pending = 1` is invisible to `query`, `delete`, `list_visible` and
//! `open_read_stream` until an update clears the flag.

use super::{
    entry_location, normalize_relative_path, ByteSink, ByteSource, ContentIndex, ContentScope,
    EntryHandle, EntryRecord, EntryValues, Selection,
};
use async_trait::async_trait;
use msp_common::{Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Indexed content store backed by SQLite
pub struct SqliteContentIndex {
    pool: SqlitePool,
    store_root: PathBuf,
    /// Known volumes, primary first
    volumes: Vec<String>,
}

impl SqliteContentIndex {
    /// `volumes` must list the primary volume first
    pub fn new(pool: SqlitePool, store_root: PathBuf, volumes: Vec<String>) -> Self {
        Self {
            pool,
            store_root,
            volumes,
        }
    }

    /// Entries left in the pending state (interrupted or failed writes)
    pub async fn pending_entries(&self) -> Result<Vec<EntryRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String)>(
            r#"
            SELECT id, volume, category, display_name, relative_path
            FROM media_entries
            WHERE is_pending = 1
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, volume, category, display_name, relative_path)| -> Result<EntryRecord> {
                Ok(EntryRecord {
                    handle: EntryHandle {
                        scope: ContentScope::new(volume, category.parse()?),
                        key: id.to_string(),
                    },
                    display_name,
                    relative_path,
                })
            })
            .collect()
    }

    fn row_id(handle: &EntryHandle) -> Result<i64> {
        handle
            .key
            .parse::<i64>()
            .map_err(|_| Error::InvalidInput(format!("Not an indexed entry handle: {}", handle)))
    }

    async fn data_path(&self, handle: &EntryHandle, visible_only: bool) -> Result<PathBuf> {
        let id = Self::row_id(handle)?;
        let data_path = sqlx::query_scalar::<_, String>(
            r#"
            SELECT data_path FROM media_entries
            WHERE id = ? AND volume = ? AND category = ?
              AND (is_pending = 0 OR ? = 0)
            "#,
        )
        .bind(id)
        .bind(&handle.scope.volume)
        .bind(handle.scope.category.as_str())
        .bind(visible_only)
        .fetch_optional(&self.pool)
        .await?;

        data_path
            .map(|p| self.store_root.join(p))
            .ok_or_else(|| Error::NotFound(handle.uri()))
    }
}

#[async_trait]
impl ContentIndex for SqliteContentIndex {
    fn supports_pending(&self) -> bool {
        true
    }

    fn external_volume_names(&self) -> Vec<String> {
        self.volumes.clone()
    }

    fn primary_volume(&self) -> String {
        self.volumes
            .first()
            .cloned()
            .unwrap_or_else(|| msp_common::config::DEFAULT_PRIMARY_VOLUME.to_string())
    }

    async fn insert(&self, scope: &ContentScope, values: &EntryValues) -> Result<EntryHandle> {
        let display_name = values
            .display_name
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("insert requires a display name".to_string()))?;
        let relative_path = normalize_relative_path(values.relative_path.as_deref().unwrap_or(""));

        // Location relative to the store root; id is filled in below
        let volume_dir = PathBuf::from(&scope.volume);
        entry_location(&volume_dir, &relative_path, display_name)?;

        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO media_entries (volume, category, display_name, relative_path, is_pending, date_added)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&scope.volume)
        .bind(scope.category.as_str())
        .bind(display_name)
        .bind(&relative_path)
        .bind(values.pending.unwrap_or(false))
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let stored_name = format!("{}_{}", id, display_name);
        let data_path = entry_location(&volume_dir, &relative_path, &stored_name)?;
        let data_path_str = data_path.to_string_lossy().to_string();

        sqlx::query("UPDATE media_entries SET data_path = ? WHERE id = ?")
            .bind(&data_path_str)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let absolute = self.store_root.join(&data_path);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::File::create(&absolute).await?;

        tx.commit().await?;

        let handle = EntryHandle {
            scope: scope.clone(),
            key: id.to_string(),
        };
        debug!(uri = %handle, data_path = %data_path_str, "Inserted entry");
        Ok(handle)
    }

    async fn query(&self, scope: &ContentScope, selection: &Selection) -> Result<Vec<EntryHandle>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM media_entries
            WHERE volume = ? AND category = ?
              AND display_name = ? AND relative_path = ?
              AND is_pending = 0
            ORDER BY id
            "#,
        )
        .bind(&scope.volume)
        .bind(scope.category.as_str())
        .bind(&selection.display_name)
        .bind(normalize_relative_path(&selection.relative_path))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids
            .into_iter()
            .map(|id| EntryHandle {
                scope: scope.clone(),
                key: id.to_string(),
            })
            .collect())
    }

    async fn delete(&self, scope: &ContentScope, selection: &Selection) -> Result<u64> {
        let relative_path = normalize_relative_path(&selection.relative_path);
        let mut tx = self.pool.begin().await?;

        let data_paths = sqlx::query_scalar::<_, String>(
            r#"
            SELECT data_path FROM media_entries
            WHERE volume = ? AND category = ?
              AND display_name = ? AND relative_path = ?
              AND is_pending = 0
            "#,
        )
        .bind(&scope.volume)
        .bind(scope.category.as_str())
        .bind(&selection.display_name)
        .bind(&relative_path)
        .fetch_all(&mut *tx)
        .await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM media_entries
            WHERE volume = ? AND category = ?
              AND display_name = ? AND relative_path = ?
              AND is_pending = 0
            "#,
        )
        .bind(&scope.volume)
        .bind(scope.category.as_str())
        .bind(&selection.display_name)
        .bind(&relative_path)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        // Rows are gone; stale bytes are only wasted space
        for data_path in data_paths {
            let absolute = self.store_root.join(&data_path);
            if let Err(e) = tokio::fs::remove_file(&absolute).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %absolute.display(), error = %e, "Failed to remove entry data");
                }
            }
        }

        Ok(removed)
    }

    async fn update(&self, handle: &EntryHandle, values: &EntryValues) -> Result<u64> {
        let id = Self::row_id(handle)?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE media_entries SET ");
        let mut any = false;
        {
            let mut sets = builder.separated(", ");
            if let Some(display_name) = &values.display_name {
                sets.push("display_name = ").push_bind_unseparated(display_name.clone());
                any = true;
            }
            if let Some(relative_path) = &values.relative_path {
                sets.push("relative_path = ")
                    .push_bind_unseparated(normalize_relative_path(relative_path));
                any = true;
            }
            if let Some(pending) = values.pending {
                sets.push("is_pending = ").push_bind_unseparated(pending);
                any = true;
            }
        }

        if !any {
            return Ok(0);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND volume = ")
            .push_bind(handle.scope.volume.clone())
            .push(" AND category = ")
            .push_bind(handle.scope.category.as_str());

        let updated = builder.build().execute(&self.pool).await?.rows_affected();
        Ok(updated)
    }

    async fn open_write_stream(&self, handle: &EntryHandle) -> Result<ByteSink> {
        let path = self.data_path(handle, false).await?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;
        Ok(Box::new(file))
    }

    async fn open_read_stream(&self, handle: &EntryHandle) -> Result<ByteSource> {
        let path = self.data_path(handle, true).await?;
        let file = tokio::fs::File::open(&path).await?;
        Ok(Box::new(file))
    }

    async fn list_visible(&self, scope: &ContentScope) -> Result<Vec<EntryRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, String)>(
            r#"
            SELECT id, display_name, relative_path
            FROM media_entries
            WHERE volume = ? AND category = ? AND is_pending = 0
            ORDER BY relative_path, display_name, id
            "#,
        )
        .bind(&scope.volume)
        .bind(scope.category.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, display_name, relative_path)| EntryRecord {
                handle: EntryHandle {
                    scope: scope.clone(),
                    key: id.to_string(),
                },
                display_name,
                relative_path,
            })
            .collect())
    }
}
