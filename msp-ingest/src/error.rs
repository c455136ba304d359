//! Error types for msp-ingest
//!
//! Every variant is folded into a single failure result at the worker
//! boundary; nothing here reaches the scheduler as a fault.

use thiserror::Error;

/// Ingest job error
#[derive(Debug, Error)]
pub enum IngestError {
    /// A required input field is absent
    #[error("Missing required input field: {0}")]
    InputMissing(&'static str),

    /// An input field is present but malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tag embedding failed (logged, never fatal)
    #[error("Tag embedding failed: {0}")]
    TagEmbed(String),

    /// Lookup or eviction of the prior entry failed
    #[error("Conflict resolution failed: {0}")]
    ConflictResolution(String),

    /// Create, fill or reveal of the new entry failed
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// Scheduler cancelled the job before the named step
    #[error("Cancelled before {0}")]
    Cancelled(&'static str),
}

/// Result type for ingest components
pub type IngestResult<T> = Result<T, IngestError>;
