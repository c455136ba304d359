//! Common error types for media-store-plus

use thiserror::Error;

/// Common result type for media store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the config layer and the content index backends
#[derive(Error, Debug)]
pub enum Error {
    /// Content index database error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error in the store or the config directory
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file unparsable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config could not be serialized back to TOML
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Store entry handle does not resolve to a row or file
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
