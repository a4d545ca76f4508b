use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{ChangelogError, Checkpoint, LogRecord, Offset, Result, Topic};

/// A stream of changelog records.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<LogRecord>> + Send>>;

/// Core trait for changelog implementations.
///
/// A changelog is an append-only log of keyed records with one global
/// offset sequence, plus per-consumer-group checkpoints.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ChangelogStore: Send + Sync {
    /// Appends records to the log.
    ///
    /// Records are appended atomically, in order, each receiving the next
    /// offset. Any offset set on the input is ignored.
    ///
    /// Returns the offset of the last appended record.
    async fn append(&self, records: Vec<LogRecord>) -> Result<Offset>;

    /// Retrieves the records of one topic with offset >= `from`, oldest first.
    async fn read_topic(&self, topic: Topic, from: Offset) -> Result<Vec<LogRecord>>;

    /// Streams the records of all topics with offset >= `from`, in offset order.
    async fn stream_from(&self, from: Offset) -> Result<RecordStream>;

    /// Returns the offset of the newest record, or `Offset::initial()` when empty.
    async fn latest_offset(&self) -> Result<Offset>;

    /// Saves a checkpoint, replacing any previous checkpoint of the same group.
    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Retrieves the checkpoint of a consumer group.
    ///
    /// Returns None if the group never committed.
    async fn get_checkpoint(&self, consumer_group: &str) -> Result<Option<Checkpoint>>;
}

/// Extension trait providing convenience methods for changelog stores.
#[async_trait]
pub trait ChangelogStoreExt: ChangelogStore {
    /// Appends a single record to the log.
    async fn append_record(&self, record: LogRecord) -> Result<Offset> {
        self.append(vec![record]).await
    }

    /// Checks whether the log holds any record.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.latest_offset().await? == Offset::initial())
    }
}

// Blanket implementation for all ChangelogStore implementations
impl<T: ChangelogStore + ?Sized> ChangelogStoreExt for T {}

/// Validates records before appending.
pub fn validate_records_for_append(records: &[LogRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(ChangelogError::InvalidAppend(
            "Cannot append empty record list".to_string(),
        ));
    }

    for record in records {
        if record.payload.is_null() {
            return Err(ChangelogError::InvalidAppend(format!(
                "Record for topic {} has a null payload",
                record.topic
            )));
        }
    }

    Ok(())
}
