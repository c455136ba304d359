//! # Media Store Plus Common Library
//!
//! Shared code for the media-store-plus crates:
//! - Error type used across crate boundaries
//! - Configuration loading (root folder, TOML config, atomic write-back)

pub mod config;
pub mod error;

pub use error::{Error, Result};
