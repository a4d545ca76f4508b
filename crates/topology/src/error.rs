//! Topology error types.

use changelog::ChangelogError;
use thiserror::Error;

/// Errors that can occur while processing records through the topology.
///
/// A join that finds no table value is not an error: the event is dropped
/// and the join returns `None`.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The field an event is re-keyed by is absent, null or empty.
    #[error("Malformed key field '{field}' on record with key '{key}'")]
    MalformedKeyField { field: &'static str, key: String },

    /// A table or aggregate store could not be read or written.
    #[error("State store '{store}' unavailable: {reason}")]
    StateStoreUnavailable { store: String, reason: String },

    /// A shard worker has exited and no longer accepts records.
    #[error("Shard {shard} is unavailable")]
    ShardUnavailable { shard: usize },

    /// Nobody is receiving the output stream any more.
    #[error("Output stream closed")]
    OutputClosed,

    /// The pipeline has been shut down.
    #[error("Pipeline is stopped")]
    Stopped,

    /// An error occurred in the changelog.
    #[error("Changelog error: {0}")]
    Changelog(#[from] ChangelogError),

    /// A record payload could not be decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl TopologyError {
    /// Returns true for errors that reject one record but leave the shard healthy.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            TopologyError::MalformedKeyField { .. } | TopologyError::Codec(_)
        )
    }
}

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;
