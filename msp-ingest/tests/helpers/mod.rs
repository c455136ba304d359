//! Test Helper Utilities
//!
//! Shared utilities for testing msp-ingest

#![allow(dead_code)]

pub mod mp3_generator;
pub mod store;

pub use mp3_generator::{generate_test_mp3, Mp3Config};
pub use store::{job_input, read_entry, TestStore};
