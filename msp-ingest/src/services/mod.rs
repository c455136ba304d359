//! Ingest components, leaf to root:
//! TagEmbedder → IdentityResolver → ConflictEraser → StagedWriter

pub mod conflict_eraser;
pub mod identity_resolver;
pub mod staged_writer;
pub mod tag_embedder;

pub use conflict_eraser::{ConflictEraser, EvictionOutcome};
pub use identity_resolver::IdentityResolver;
pub use staged_writer::StagedWriter;
pub use tag_embedder::{EmbedOutcome, TagEmbedder};
