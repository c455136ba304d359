//! msp-ingest library interface
//!
//! Commits a locally staged media file into the managed media store,
//! replacing any prior entry with the same identity, and only exposing the
//! new entry once it is fully written.

pub mod context;
pub mod db;
pub mod error;
pub mod index;
pub mod models;
pub mod services;
pub mod worker;

pub use crate::error::{IngestError, IngestResult};
pub use crate::worker::{IngestWorker, JobOutcome, JobReport, JobState};
