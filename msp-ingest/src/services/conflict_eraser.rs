//! Eviction of a prior entry sharing the new entry's identity

use super::IdentityResolver;
use crate::context::LogContext;
use crate::error::{IngestError, IngestResult};
use crate::index::ContentIndex;
use crate::models::StorageIdentity;
use std::sync::Arc;
use tracing::{debug, info};

/// What eviction did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionOutcome {
    NothingRemoved,
    Removed(u64),
}

pub struct ConflictEraser {
    index: Arc<dyn ContentIndex>,
}

impl ConflictEraser {
    pub fn new(index: Arc<dyn ContentIndex>) -> Self {
        Self { index }
    }

    /// Delete every visible entry with this identity
    ///
    /// Looks up first and deletes only if something matched; zero matches is
    /// not an error. Not transactional with the write that follows.
    pub async fn erase(
        &self,
        resolver: &IdentityResolver,
        identity: &StorageIdentity,
        ctx: &LogContext,
    ) -> IngestResult<EvictionOutcome> {
        let Some(existing) = resolver.lookup(identity, ctx).await? else {
            debug!(parent: ctx.span(), "No prior entry to evict");
            return Ok(EvictionOutcome::NothingRemoved);
        };

        let removed = self
            .index
            .delete(&identity.scope(), &identity.selection())
            .await
            .map_err(|e| IngestError::ConflictResolution(format!("Delete failed: {}", e)))?;

        if removed == 0 {
            // Someone else removed it between lookup and delete
            debug!(parent: ctx.span(), uri = %existing, "Prior entry vanished before delete");
            return Ok(EvictionOutcome::NothingRemoved);
        }

        info!(
            parent: ctx.span(),
            uri = %existing,
            removed = removed,
            "Evicted prior entry"
        );
        Ok(EvictionOutcome::Removed(removed))
    }
}
