//! Create → fill → reveal
//!
//! On a pending-capable index the entry is inserted hidden, filled, and only
//! then made visible. A failure or cancellation after the insert leaves the
//! entry pending; there is no rollback. On the direct backend the pending
//! phase is skipped and the entry is visible from the insert onwards.

use crate::context::LogContext;
use crate::error::{IngestError, IngestResult};
use crate::index::{ContentIndex, EntryHandle, EntryValues};
use crate::models::StorageIdentity;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct StagedWriter {
    index: Arc<dyn ContentIndex>,
}

impl StagedWriter {
    pub fn new(index: Arc<dyn ContentIndex>) -> Self {
        Self { index }
    }

    /// Write `source` into a new entry for `identity` and make it visible
    pub async fn commit(
        &self,
        identity: &StorageIdentity,
        source: &Path,
        ctx: &LogContext,
        cancel_token: &CancellationToken,
    ) -> IngestResult<EntryHandle> {
        let staged = self.index.supports_pending();
        let handle = self.create(identity, staged).await?;
        debug!(parent: ctx.span(), uri = %handle, pending = staged, "Created entry");

        if cancel_token.is_cancelled() {
            return Err(IngestError::Cancelled("fill"));
        }

        let bytes = self.fill(&handle, source).await?;
        debug!(parent: ctx.span(), uri = %handle, bytes = bytes, "Filled entry");

        if cancel_token.is_cancelled() {
            return Err(IngestError::Cancelled("reveal"));
        }

        if staged {
            self.reveal(&handle).await?;
        }

        info!(parent: ctx.span(), uri = %handle, bytes = bytes, "Entry committed");
        Ok(handle)
    }

    async fn create(&self, identity: &StorageIdentity, staged: bool) -> IngestResult<EntryHandle> {
        let mut values = EntryValues::pending_entry(&identity.display_name, &identity.relative_path);
        if !staged {
            values.pending = None;
        }

        self.index
            .insert(&identity.scope(), &values)
            .await
            .map_err(|e| IngestError::StoreWrite(format!("Create failed: {}", e)))
    }

    async fn fill(&self, handle: &EntryHandle, source: &Path) -> IngestResult<u64> {
        let mut input = tokio::fs::File::open(source)
            .await
            .map_err(|e| IngestError::StoreWrite(format!("Failed to open staging file: {}", e)))?;

        let mut sink = self
            .index
            .open_write_stream(handle)
            .await
            .map_err(|e| IngestError::StoreWrite(format!("Failed to open entry stream: {}", e)))?;

        let copied = tokio::io::copy(&mut input, &mut sink)
            .await
            .map_err(|e| IngestError::StoreWrite(format!("Byte copy failed: {}", e)))?;

        sink.flush()
            .await
            .map_err(|e| IngestError::StoreWrite(format!("Flush failed: {}", e)))?;
        sink.shutdown()
            .await
            .map_err(|e| IngestError::StoreWrite(format!("Close failed: {}", e)))?;

        Ok(copied)
    }

    async fn reveal(&self, handle: &EntryHandle) -> IngestResult<()> {
        let updated = self
            .index
            .update(handle, &EntryValues::reveal())
            .await
            .map_err(|e| IngestError::StoreWrite(format!("Reveal failed: {}", e)))?;

        if updated == 0 {
            return Err(IngestError::StoreWrite(format!(
                "Reveal matched no entry: {}",
                handle
            )));
        }
        Ok(())
    }
}
