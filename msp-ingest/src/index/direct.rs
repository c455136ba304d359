//! Direct filesystem store (no pending phase)
//!
//! Entries are plain files at
//! `<store>/<volume>/<category>/<relative_path>/<display_name>`, so an entry
//! is visible the moment it is created. Used where no managed index is
//! available.

use super::{
    entry_location, normalize_relative_path, ByteSink, ByteSource, ContentIndex, ContentScope,
    EntryHandle, EntryRecord, EntryValues, Selection,
};
use async_trait::async_trait;
use msp_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Filesystem-only content store
pub struct DirectFsIndex {
    store_root: PathBuf,
    /// Known volumes, primary first
    volumes: Vec<String>,
}

impl DirectFsIndex {
    pub fn new(store_root: PathBuf, volumes: Vec<String>) -> Self {
        Self { store_root, volumes }
    }

    fn scope_dir(&self, scope: &ContentScope) -> Result<PathBuf> {
        // Volume names come from callers; keep them to one path segment
        let volume = Path::new(&scope.volume);
        if volume.components().count() != 1 || scope.volume == ".." || scope.volume == "." {
            return Err(Error::InvalidInput(format!("Invalid volume name: {}", scope.volume)));
        }
        Ok(self.store_root.join(volume).join(scope.category.as_str()))
    }

    fn handle_path(&self, handle: &EntryHandle) -> Result<PathBuf> {
        let (relative_path, display_name) = match handle.key.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", handle.key.as_str()),
        };
        entry_location(&self.scope_dir(&handle.scope)?, relative_path, display_name)
    }

    fn handle_for(scope: &ContentScope, relative_path: &str, display_name: &str) -> EntryHandle {
        EntryHandle {
            scope: scope.clone(),
            key: format!("{}{}", normalize_relative_path(relative_path), display_name),
        }
    }
}

#[async_trait]
impl ContentIndex for DirectFsIndex {
    fn supports_pending(&self) -> bool {
        false
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
        let relative_path = values.relative_path.as_deref().unwrap_or("");

        let path = entry_location(&self.scope_dir(scope)?, relative_path, display_name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::File::create(&path).await?;

        let handle = Self::handle_for(scope, relative_path, display_name);
        debug!(uri = %handle, path = %path.display(), "Created entry file");
        Ok(handle)
    }

    async fn query(&self, scope: &ContentScope, selection: &Selection) -> Result<Vec<EntryHandle>> {
        let path = entry_location(
            &self.scope_dir(scope)?,
            &selection.relative_path,
            &selection.display_name,
        )?;

        if tokio::fs::try_exists(&path).await? {
            Ok(vec![Self::handle_for(
                scope,
                &selection.relative_path,
                &selection.display_name,
            )])
        } else {
            Ok(Vec::new())
        }
    }

    async fn delete(&self, scope: &ContentScope, selection: &Selection) -> Result<u64> {
        let path = entry_location(
            &self.scope_dir(scope)?,
            &selection.relative_path,
            &selection.display_name,
        )?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(1),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn update(&self, handle: &EntryHandle, _values: &EntryValues) -> Result<u64> {
        // No pending flag to flip; report whether the entry exists
        let path = self.handle_path(handle)?;
        Ok(u64::from(tokio::fs::try_exists(&path).await?))
    }

    async fn open_write_stream(&self, handle: &EntryHandle) -> Result<ByteSink> {
        let path = self.handle_path(handle)?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::NotFound(handle.uri()),
                _ => Error::Io(e),
            })?;
        Ok(Box::new(file))
    }

    async fn open_read_stream(&self, handle: &EntryHandle) -> Result<ByteSource> {
        let path = self.handle_path(handle)?;
        let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(handle.uri()),
            _ => Error::Io(e),
        })?;
        Ok(Box::new(file))
    }

    async fn list_visible(&self, scope: &ContentScope) -> Result<Vec<EntryRecord>> {
        let scope_dir = self.scope_dir(scope)?;
        let scope = scope.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<EntryRecord>> {
            let mut records = Vec::new();
            if !scope_dir.exists() {
                return Ok(records);
            }

            for entry in WalkDir::new(&scope_dir).sort_by_file_name() {
                let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let display_name = entry.file_name().to_string_lossy().to_string();
                let relative_dir = entry
                    .path()
                    .parent()
                    .and_then(|p| p.strip_prefix(&scope_dir).ok())
                    .map(|p| {
                        p.components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect::<Vec<_>>()
                            .join("/")
                    })
                    .unwrap_or_default();
                let relative_path = normalize_relative_path(&relative_dir);

                records.push(EntryRecord {
                    handle: Self::handle_for(&scope, &relative_path, &display_name),
                    display_name,
                    relative_path,
                });
            }
            Ok(records)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}
