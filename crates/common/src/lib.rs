//! Shared types for the order enrichment pipeline.

pub mod types;

pub use types::{Keyed, RecordKey};
