use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Offset;

/// The last changelog offset whose output a consumer group has delivered.
///
/// On restart, records at or below the checkpoint only rebuild state;
/// records after it are processed normally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The consumer group this checkpoint belongs to.
    pub consumer_group: String,

    /// Highest offset fully processed by the group.
    pub offset: Offset,

    /// When the checkpoint was taken.
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    /// Creates a checkpoint stamped with the current time.
    pub fn new(consumer_group: impl Into<String>, offset: Offset) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            offset,
            timestamp: Utc::now(),
        }
    }

    /// Returns true if the record at `offset` was already delivered.
    pub fn covers(&self, offset: Offset) -> bool {
        offset <= self.offset
    }
}
