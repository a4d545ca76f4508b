//! Pipeline configuration.

/// Settings for the sharded runtime and its changelog consumer.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of reference shards and of order shards.
    pub shard_count: usize,
    /// Capacity of each ingestion channel and of the output channel.
    pub channel_capacity: usize,
    /// Consumer group under which checkpoints are committed.
    pub consumer_group: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shard_count: 4,
            channel_capacity: 1024,
            consumer_group: "order-enricher".to_string(),
        }
    }
}
