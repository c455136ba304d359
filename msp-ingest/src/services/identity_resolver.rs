//! Identity computation and prior-entry lookup

use crate::context::LogContext;
use crate::error::{IngestError, IngestResult};
use crate::index::{ContentIndex, EntryHandle};
use crate::models::{relative_path, IngestRequest, StorageIdentity};
use std::sync::Arc;
use tracing::debug;

pub struct IdentityResolver {
    index: Arc<dyn ContentIndex>,
}

impl IdentityResolver {
    pub fn new(index: Arc<dyn ContentIndex>) -> Self {
        Self { index }
    }

    /// Requested volume if the platform knows it (case-insensitive),
    /// otherwise the primary volume
    pub fn resolve_volume(&self, requested: Option<&str>, ctx: &LogContext) -> String {
        let Some(requested) = requested else {
            return self.index.primary_volume();
        };

        match self
            .index
            .external_volume_names()
            .into_iter()
            .find(|known| known.to_lowercase() == requested.to_lowercase())
        {
            Some(volume) => volume,
            None => {
                let primary = self.index.primary_volume();
                debug!(
                    parent: ctx.span(),
                    requested = %requested,
                    volume = %primary,
                    "Unknown volume, using primary"
                );
                primary
            }
        }
    }

    pub fn resolve(&self, request: &IngestRequest, ctx: &LogContext) -> StorageIdentity {
        StorageIdentity {
            display_name: request.display_name.clone(),
            relative_path: relative_path(&request.base_directory, &request.app_folder),
            category: request.category,
            volume: self.resolve_volume(request.volume.as_deref(), ctx),
        }
    }

    /// First visible entry with this identity, if any
    pub async fn lookup(
        &self,
        identity: &StorageIdentity,
        ctx: &LogContext,
    ) -> IngestResult<Option<EntryHandle>> {
        let scope = identity.scope();
        let handles = self
            .index
            .query(&scope, &identity.selection())
            .await
            .map_err(|e| IngestError::ConflictResolution(format!("Lookup failed: {}", e)))?;

        let found = handles.into_iter().next();
        debug!(
            parent: ctx.span(),
            scope = %scope,
            found = ?found.as_ref().map(|h| h.uri()),
            "Looked up existing entry"
        );
        Ok(found)
    }
}
