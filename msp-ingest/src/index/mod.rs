//! Content index capability
//!
//! The store is reached only through [`ContentIndex`]. Two backends exist,
//! chosen once at startup from `[store] backend`:
//! - [`SqliteContentIndex`]: entries indexed in SQLite, with a pending
//!   state that hides an entry from readers until it is revealed
//! - [`DirectFsIndex`]: plain files, no pending phase
//!
//! Each call is atomic on its own; sequences of calls are not.

pub mod direct;
pub mod sqlite;

pub use direct::DirectFsIndex;
pub use sqlite::SqliteContentIndex;

use async_trait::async_trait;
use msp_common::config::{BackendKind, StoreConfig};
use msp_common::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Media category of a store entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Image,
    Audio,
    Video,
    Download,
}

impl Category {
    /// Map the wire `dirType` code; unknown codes land in downloads
    pub fn from_dir_type(code: i64) -> Self {
        match code {
            0 => Category::Image,
            1 => Category::Audio,
            2 => Category::Video,
            _ => Category::Download,
        }
    }

    /// Scope segment used in URIs, rows and directory names
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Image => "images",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::Download => "downloads",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(Category::Image),
            "audio" => Ok(Category::Audio),
            "video" => Ok(Category::Video),
            "download" | "downloads" => Ok(Category::Download),
            other => Err(Error::InvalidInput(format!("Unknown category: {}", other))),
        }
    }
}

/// A category within one volume
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentScope {
    pub volume: String,
    pub category: Category,
}

impl ContentScope {
    pub fn new(volume: impl Into<String>, category: Category) -> Self {
        Self {
            volume: volume.into(),
            category,
        }
    }

    pub fn uri(&self) -> String {
        format!("content://media/{}/{}", self.volume, self.category.as_str())
    }
}

impl fmt::Display for ContentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Opaque handle to one store entry, valid for the duration of a job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    pub scope: ContentScope,
    /// Backend-specific key (row id, or relative file path)
    pub key: String,
}

impl EntryHandle {
    pub fn uri(&self) -> String {
        format!("{}/{}", self.scope.uri(), self.key)
    }
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Exact-match predicate on display name and relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub display_name: String,
    pub relative_path: String,
}

/// Column values for insert/update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryValues {
    pub display_name: Option<String>,
    pub relative_path: Option<String>,
    pub pending: Option<bool>,
}

impl EntryValues {
    /// Values for a freshly created, still hidden entry
    pub fn pending_entry(display_name: &str, relative_path: &str) -> Self {
        Self {
            display_name: Some(display_name.to_string()),
            relative_path: Some(relative_path.to_string()),
            pending: Some(true),
        }
    }

    /// Values that make an entry visible to readers
    pub fn reveal() -> Self {
        Self {
            pending: Some(false),
            ..Self::default()
        }
    }
}

/// A visible entry as seen by store readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub handle: EntryHandle,
    pub display_name: String,
    pub relative_path: String,
}

pub type ByteSink = Box<dyn AsyncWrite + Send + Unpin>;
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// Capability interface over the managed store
#[async_trait]
pub trait ContentIndex: Send + Sync {
    /// Whether inserted entries can be hidden until revealed
    fn supports_pending(&self) -> bool;

    /// Known volumes, primary first
    fn external_volume_names(&self) -> Vec<String>;

    fn primary_volume(&self) -> String;

    async fn insert(&self, scope: &ContentScope, values: &EntryValues) -> Result<EntryHandle>;

    /// Visible entries matching the selection, oldest first
    async fn query(&self, scope: &ContentScope, selection: &Selection) -> Result<Vec<EntryHandle>>;

    /// Remove visible entries matching the selection; returns the count
    async fn delete(&self, scope: &ContentScope, selection: &Selection) -> Result<u64>;

    async fn update(&self, handle: &EntryHandle, values: &EntryValues) -> Result<u64>;

    async fn open_write_stream(&self, handle: &EntryHandle) -> Result<ByteSink>;

    /// Readers only ever get visible entries
    async fn open_read_stream(&self, handle: &EntryHandle) -> Result<ByteSource>;

    async fn list_visible(&self, scope: &ContentScope) -> Result<Vec<EntryRecord>>;
}

/// Build the configured backend
pub async fn open_content_index(
    store_config: &StoreConfig,
    database_path: &Path,
    store_root: PathBuf,
) -> Result<Arc<dyn ContentIndex>> {
    let volumes = store_config.volume_names();
    match store_config.backend {
        BackendKind::Indexed => {
            let pool = crate::db::init_database_pool(database_path).await?;
            Ok(Arc::new(SqliteContentIndex::new(pool, store_root, volumes)))
        }
        BackendKind::Direct => Ok(Arc::new(DirectFsIndex::new(store_root, volumes))),
    }
}

/// Canonical form of a relative path: `/`-separated, one trailing `/`
///
/// `Music`, `Music/` and `Music//` all normalise to `Music/`; the empty
/// path stays empty. Only `/` separates segments, so `Music\App` is a
/// single segment.
pub fn normalize_relative_path(relative_path: &str) -> String {
    let parts: Vec<&str> = relative_path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!("{}/", parts.join("/"))
    }
}

/// Join a relative path and display name under `base`, refusing escapes
pub(crate) fn entry_location(base: &Path, relative_path: &str, display_name: &str) -> Result<PathBuf> {
    validate_display_name(display_name)?;

    let mut path = base.to_path_buf();
    for part in normalize_relative_path(relative_path).split('/') {
        if part.is_empty() {
            continue;
        }
        if part == ".." {
            return Err(Error::InvalidInput(format!(
                "Relative path escapes the store: {}",
                relative_path
            )));
        }
        path.push(part);
    }
    path.push(display_name);
    Ok(path)
}

fn validate_display_name(display_name: &str) -> Result<()> {
    if display_name.is_empty()
        || display_name == "."
        || display_name == ".."
        || display_name.contains(['/', '\\'])
    {
        return Err(Error::InvalidInput(format!(
            "Invalid display name: {:?}",
            display_name
        )));
    }
    Ok(())
}
