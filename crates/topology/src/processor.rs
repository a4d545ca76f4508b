//! Changelog-backed processor feeding the sharded runtime.

use std::sync::Arc;

use changelog::{ChangelogStore, ChangelogStoreExt, Checkpoint, LogRecord, Offset};
use common::Keyed;
use domain::{Customer, Order, OrderLineItem, Product};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::config::PipelineConfig;
use crate::input::InputRecord;
use crate::runtime::{PipelineRuntime, RuntimeOutputs};
use crate::store::{InMemoryStores, StoreProvider};
use crate::{Result, TopologyError};

/// Summary of a [`EnrichmentProcessor::recover`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records dispatched again.
    pub replayed: u64,
    /// Of those, records at or below the checkpoint, replayed without output.
    pub restored: u64,
    /// Records that could not be decoded or routed.
    pub skipped: u64,
}

struct ProcessorState {
    runtime: Option<PipelineRuntime>,
    last_dispatched: Offset,
}

/// Appends input records to a changelog and dispatches them to a
/// [`PipelineRuntime`].
///
/// The processor supports:
/// - Ingest: append one record, then dispatch it, as one step
/// - Recovery: rebuild shard state by replaying the changelog, producing
///   output only for records after the committed checkpoint
/// - Shutdown: drain the shards and commit a checkpoint
///
/// Ingest and recovery are serialized, so records reach the shards in
/// offset order.
pub struct EnrichmentProcessor<C: ChangelogStore> {
    changelog: C,
    consumer_group: String,
    state: Mutex<ProcessorState>,
}

impl<C: ChangelogStore> EnrichmentProcessor<C> {
    /// Starts a runtime with in-memory stores.
    ///
    /// The returned outputs should be drained before calling
    /// [`recover`](Self::recover), since replay may emit orders.
    pub fn new(changelog: C, config: &PipelineConfig) -> (Self, RuntimeOutputs) {
        Self::with_stores(changelog, config, Arc::new(InMemoryStores))
    }

    pub fn with_stores(
        changelog: C,
        config: &PipelineConfig,
        stores: Arc<dyn StoreProvider>,
    ) -> (Self, RuntimeOutputs) {
        let (runtime, outputs) = PipelineRuntime::start_with_stores(config, stores);
        let processor = Self {
            changelog,
            consumer_group: config.consumer_group.clone(),
            state: Mutex::new(ProcessorState {
                runtime: Some(runtime),
                last_dispatched: Offset::initial(),
            }),
        };
        (processor, outputs)
    }

    pub fn changelog(&self) -> &C {
        &self.changelog
    }

    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    /// Offset of the last record handed to the runtime.
    pub async fn last_dispatched(&self) -> Offset {
        self.state.lock().await.last_dispatched
    }

    /// Replays every record not yet dispatched by this processor.
    ///
    /// Records covered by the consumer group's checkpoint rebuild state
    /// only; the rest also produce output. Calling it again replays nothing.
    #[tracing::instrument(skip(self), fields(consumer_group = %self.consumer_group))]
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut state = self.state.lock().await;
        let ProcessorState {
            runtime,
            last_dispatched,
        } = &mut *state;
        let runtime = runtime.as_ref().ok_or(TopologyError::Stopped)?;

        let checkpoint = self.changelog.get_checkpoint(&self.consumer_group).await?;
        let mut stream = self.changelog.stream_from(last_dispatched.next()).await?;
        let mut report = RecoveryReport::default();

        while let Some(record) = stream.next().await {
            let record = record?;
            let offset = record.offset;
            let emit = !checkpoint.as_ref().is_some_and(|c| c.covers(offset));

            let dispatched = match InputRecord::decode(&record) {
                Ok(input) => runtime.dispatch(input, offset, emit).await,
                Err(e) => Err(e),
            };

            match dispatched {
                Ok(()) => {
                    report.replayed += 1;
                    if !emit {
                        report.restored += 1;
                    }
                    metrics::counter!("topology_records_replayed_total").increment(1);
                }
                Err(e) if e.is_record_error() => {
                    tracing::warn!(
                        offset = %offset,
                        topic = %record.topic,
                        error = %e,
                        "Skipping record"
                    );
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
            *last_dispatched = offset;
        }

        tracing::info!(
            replayed = report.replayed,
            restored = report.restored,
            skipped = report.skipped,
            "Recovery complete"
        );
        Ok(report)
    }

    /// Appends a record to the changelog and dispatches it.
    ///
    /// A record that cannot be decoded or routed is rejected before it is
    /// appended.
    #[tracing::instrument(skip(self, record), fields(topic = %record.topic))]
    pub async fn ingest_record(&self, record: LogRecord) -> Result<Offset> {
        let input = InputRecord::decode(&record)?;

        let mut state = self.state.lock().await;
        let runtime = state.runtime.as_ref().ok_or(TopologyError::Stopped)?;
        runtime.shard_of(&input)?;

        let offset = self.changelog.append_record(record).await?;
        // A record that fails to dispatch stays after `last_dispatched`, so
        // the next recovery replays it.
        runtime.dispatch(input, offset, true).await?;
        state.last_dispatched = offset;

        tracing::debug!(offset = %offset, "Record ingested");
        Ok(offset)
    }

    pub async fn ingest(&self, input: InputRecord) -> Result<Offset> {
        self.ingest_record(input.to_log_record()?).await
    }

    /// Ingests a customer keyed by its id.
    pub async fn ingest_customer(&self, customer: Customer) -> Result<Offset> {
        self.ingest(customer.into()).await
    }

    /// Ingests a product keyed by its id.
    pub async fn ingest_product(&self, product: Product) -> Result<Offset> {
        self.ingest(product.into()).await
    }

    pub async fn ingest_order(&self, key: Option<&str>, order: Order) -> Result<Offset> {
        self.ingest(InputRecord::Order(Keyed::new(key.unwrap_or_default(), order)))
            .await
    }

    pub async fn ingest_line_item(&self, key: Option<&str>, item: OrderLineItem) -> Result<Offset> {
        self.ingest(InputRecord::LineItem(Keyed::new(key.unwrap_or_default(), item)))
            .await
    }

    /// Waits until every ingested record has been processed.
    pub async fn flush(&self) -> Result<()> {
        let state = self.state.lock().await;
        let runtime = state.runtime.as_ref().ok_or(TopologyError::Stopped)?;
        runtime.flush().await
    }

    /// Drains the runtime and commits a checkpoint at the last dispatched offset.
    ///
    /// No checkpoint is committed if a shard failed. Further ingests fail
    /// with [`TopologyError::Stopped`]; shutting down again is a no-op.
    #[tracing::instrument(skip(self), fields(consumer_group = %self.consumer_group))]
    pub async fn shutdown(&self) -> Result<Offset> {
        let mut state = self.state.lock().await;
        let Some(runtime) = state.runtime.take() else {
            return Ok(state.last_dispatched);
        };
        runtime.shutdown().await?;

        let offset = state.last_dispatched;
        if offset > Offset::initial() {
            self.changelog
                .save_checkpoint(Checkpoint::new(self.consumer_group.clone(), offset))
                .await?;
        }

        tracing::info!(offset = %offset, "Checkpoint committed");
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use changelog::{InMemoryChangelog, Topic};
    use common::RecordKey;
    use domain::ProductSet;

    use crate::store::KeyValueStore;

    struct DetachedStore;

    impl<V> KeyValueStore<V> for DetachedStore {
        fn name(&self) -> &str {
            "detached"
        }

        fn get(&self, _key: &RecordKey) -> Result<Option<V>> {
            Err(detached())
        }

        fn put(&mut self, _key: RecordKey, _value: V) -> Result<()> {
            Err(detached())
        }

        fn len(&self) -> usize {
            0
        }
    }

    fn detached() -> TopologyError {
        TopologyError::StateStoreUnavailable {
            store: "detached".to_string(),
            reason: "volume unmounted".to_string(),
        }
    }

    /// Customer stores fail, so the first customer stops its shard.
    struct DetachedCustomers;

    impl StoreProvider for DetachedCustomers {
        fn customers(&self, _shard: usize) -> Box<dyn KeyValueStore<Customer>> {
            Box::new(DetachedStore)
        }

        fn products(&self, shard: usize) -> Box<dyn KeyValueStore<Product>> {
            InMemoryStores.products(shard)
        }

        fn line_items(&self, shard: usize) -> Box<dyn KeyValueStore<ProductSet>> {
            InMemoryStores.line_items(shard)
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            shard_count: 2,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_appends_and_emits() {
        let changelog = InMemoryChangelog::new();
        let (processor, mut outputs) = EnrichmentProcessor::new(changelog.clone(), &config());

        processor.ingest_customer(Customer::new("c1", "Alice")).await.unwrap();
        let offset = processor
            .ingest_order(Some("k1"), Order::new("o1", "c1"))
            .await
            .unwrap();
        assert_eq!(offset, Offset::new(2));

        let committed = processor.shutdown().await.unwrap();
        assert_eq!(committed, Offset::new(2));

        let emitted = outputs.orders.recv().await.unwrap();
        assert_eq!(emitted.offset, Offset::new(2));
        assert_eq!(emitted.order.value.customer_name, "Alice");

        let orders = changelog.read_topic(Topic::Orders, Offset::first()).await.unwrap();
        assert_eq!(orders[0].key.as_deref(), Some("k1"));
    }

    #[tokio::test]
    async fn test_unroutable_record_is_not_appended() {
        let changelog = InMemoryChangelog::new();
        let (processor, _outputs) = EnrichmentProcessor::new(changelog.clone(), &config());

        let mut order = Order::new("o1", "c1");
        order.customer_id = None;
        let err = processor.ingest_order(None, order).await.unwrap_err();

        assert!(matches!(err, TopologyError::MalformedKeyField { .. }));
        assert_eq!(changelog.record_count().await, 0);
        processor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ingest_after_shutdown_fails() {
        let (processor, _outputs) = EnrichmentProcessor::new(InMemoryChangelog::new(), &config());
        processor.shutdown().await.unwrap();

        let err = processor
            .ingest_product(Product::new("p1", "Widget"))
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::Stopped));
        assert_eq!(processor.shutdown().await.unwrap(), Offset::initial());
    }

    #[tokio::test]
    async fn test_failed_dispatch_does_not_advance_last_dispatched() {
        let changelog = InMemoryChangelog::new();
        let config = PipelineConfig {
            shard_count: 1,
            ..PipelineConfig::default()
        };
        let (processor, _outputs) = EnrichmentProcessor::with_stores(
            changelog.clone(),
            &config,
            Arc::new(DetachedCustomers),
        );

        processor.ingest_customer(Customer::new("c1", "Alice")).await.unwrap();
        assert!(matches!(
            processor.flush().await.unwrap_err(),
            TopologyError::ShardUnavailable { .. }
        ));

        let err = processor
            .ingest_customer(Customer::new("c2", "Bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::ShardUnavailable { shard: 0 }));
        assert_eq!(processor.last_dispatched().await, Offset::new(1));
        assert_eq!(changelog.record_count().await, 2);

        let err = processor.recover().await.unwrap_err();
        assert!(matches!(err, TopologyError::ShardUnavailable { shard: 0 }));
        assert_eq!(processor.last_dispatched().await, Offset::new(1));

        assert!(matches!(
            processor.shutdown().await.unwrap_err(),
            TopologyError::StateStoreUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_recover_twice_replays_once() {
        let changelog = InMemoryChangelog::new();
        changelog
            .append_record(InputRecord::from(Customer::new("c1", "Alice")).to_log_record().unwrap())
            .await
            .unwrap();

        let (processor, _outputs) = EnrichmentProcessor::new(changelog, &config());
        assert_eq!(processor.recover().await.unwrap().replayed, 1);
        assert_eq!(processor.recover().await.unwrap().replayed, 0);
        assert_eq!(processor.last_dispatched().await, Offset::new(1));
        processor.shutdown().await.unwrap();
    }
}
