//! Data models for ingest jobs

pub mod identity;
pub mod request;

pub use identity::{relative_path, StorageIdentity, PATH_SEPARATOR};
pub use request::{IngestRequest, JobInput, TagSet};
