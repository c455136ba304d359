//! Per-job logging context
//!
//! Each job owns one span; components receive the context and log under it
//! with `parent: ctx.span()`, so concurrent jobs never share a tag.

use tracing::field::Empty;
use tracing::Span;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LogContext {
    job_id: Uuid,
    span: Span,
}

impl LogContext {
    pub fn new(job_id: Uuid) -> Self {
        let span = tracing::info_span!("ingest_job", job_id = %job_id, name = Empty);
        Self { job_id, span }
    }

    /// Context for a fresh job id
    pub fn for_new_job() -> Self {
        Self::new(Uuid::new_v4())
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Attach the display name once the input has been validated
    pub fn record_name(&self, display_name: &str) {
        self.span.record("name", display_name);
    }
}
