//! Temporary media stores
//!
//! Each [`TestStore`] owns a temp root holding a staging directory and one
//! backend, indexed or direct, with volumes `external_primary` and `SdCard`.

use msp_common::config::{BackendKind, StoreConfig};
use msp_ingest::index::{open_content_index, Category, ContentIndex, ContentScope, EntryHandle, EntryRecord};
use msp_ingest::models::JobInput;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

pub struct TestStore {
    pub dir: TempDir,
    pub index: Arc<dyn ContentIndex>,
}

impl TestStore {
    pub async fn indexed() -> Self {
        Self::with_backend(BackendKind::Indexed).await
    }

    pub async fn direct() -> Self {
        Self::with_backend(BackendKind::Direct).await
    }

    async fn with_backend(backend: BackendKind) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store_config = StoreConfig {
            backend,
            external_volumes: vec!["SdCard".to_string()],
            ..StoreConfig::default()
        };

        let index = open_content_index(
            &store_config,
            &dir.path().join("media_index.db"),
            dir.path().join("store"),
        )
        .await
        .expect("open content index");

        Self { dir, index }
    }

    /// Path for a staging file; the directory is created on demand
    pub fn staging_path(&self, name: &str) -> PathBuf {
        let staging = self.dir.path().join("staging");
        std::fs::create_dir_all(&staging).expect("staging dir");
        staging.join(name)
    }

    pub async fn visible(&self, volume: &str, category: Category) -> Vec<EntryRecord> {
        self.index
            .list_visible(&ContentScope::new(volume, category))
            .await
            .expect("list visible entries")
    }

    pub async fn visible_audio(&self) -> Vec<EntryRecord> {
        self.visible("external_primary", Category::Audio).await
    }
}

/// Job input for an audio file under `Music`, optionally tagged
pub fn job_input(staging: &Path, name: &str, app_folder: &str, tags: Option<Value>) -> JobInput {
    let mut input = json!({
        "path": staging.to_string_lossy(),
        "name": name,
        "appFolder": app_folder,
        "dirType": 1,
        "dirName": "Music",
    });
    if let Some(tags) = tags {
        input["id3v2Tags"] = tags;
    }
    serde_json::from_value(input).expect("valid job input")
}

/// Full contents of a visible entry
pub async fn read_entry(index: &Arc<dyn ContentIndex>, handle: &EntryHandle) -> Vec<u8> {
    let mut stream = index.open_read_stream(handle).await.expect("open read stream");
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await.expect("read entry");
    bytes
}
