use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    Checkpoint, LogRecord, Offset, Result, Topic,
    store::{ChangelogStore, RecordStream, validate_records_for_append},
};

/// In-memory changelog implementation.
///
/// Provides the same interface as the PostgreSQL implementation; the log
/// survives as long as any clone of the store is alive.
#[derive(Clone, Default)]
pub struct InMemoryChangelog {
    records: Arc<RwLock<Vec<LogRecord>>>,
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryChangelog {
    /// Creates a new empty in-memory changelog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Clears all records and checkpoints.
    pub async fn clear(&self) {
        self.records.write().await.clear();
        self.checkpoints.write().await.clear();
    }
}

#[async_trait]
impl ChangelogStore for InMemoryChangelog {
    async fn append(&self, records: Vec<LogRecord>) -> Result<Offset> {
        validate_records_for_append(&records)?;

        let mut log = self.records.write().await;
        let mut last = log.last().map(|r| r.offset).unwrap_or_default();

        let appended = records.len();
        for mut record in records {
            last = last.next();
            record.offset = last;
            log.push(record);
        }

        metrics::counter!("changelog_records_appended_total").increment(appended as u64);
        Ok(last)
    }

    async fn read_topic(&self, topic: Topic, from: Offset) -> Result<Vec<LogRecord>> {
        let log = self.records.read().await;
        Ok(log
            .iter()
            .filter(|r| r.topic == topic && r.offset >= from)
            .cloned()
            .collect())
    }

    async fn stream_from(&self, from: Offset) -> Result<RecordStream> {
        use futures_util::stream;

        let log = self.records.read().await;
        let records: Vec<_> = log.iter().filter(|r| r.offset >= from).cloned().collect();

        let stream = stream::iter(records.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn latest_offset(&self) -> Result<Offset> {
        let log = self.records.read().await;
        Ok(log.last().map(|r| r.offset).unwrap_or_default())
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.consumer_group.clone(), checkpoint);
        Ok(())
    }

    async fn get_checkpoint(&self, consumer_group: &str) -> Result<Option<Checkpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(consumer_group).cloned())
    }
}
