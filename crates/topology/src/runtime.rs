//! Sharded execution of the topology on tokio tasks.
//!
//! Records are routed to one of `shard_count` reference shards by the key
//! the reference stage partitions on (customer id, product id or the table
//! key). Reference shards forward enriched records to one of `shard_count`
//! order shards by order id. Every shard owns its stores exclusively, so all
//! records with equal keys are processed by one task, in arrival order.
//!
//! Shutdown cascades: dropping the ingestion senders lets reference shards
//! drain and exit, which drops the last handoff senders and lets order
//! shards drain and exit.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use changelog::{Offset, Topic};
use common::{Keyed, RecordKey};
use domain::{EnrichedLineItemDetail, EnrichedOrder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::config::PipelineConfig;
use crate::input::InputRecord;
use crate::rekey::{self, key_of};
use crate::store::{InMemoryStores, StoreProvider};
use crate::topology::{OrderStage, ReferenceStage};
use crate::{Result, TopologyError};

/// An enriched order together with the offset of the order record that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedOrder {
    pub offset: Offset,
    pub order: Keyed<EnrichedOrder>,
}

/// A record rejected inside a shard.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub topic: Topic,
    pub offset: Offset,
    pub error: String,
}

/// The receiving ends of a running pipeline.
///
/// `orders` is bounded: if it is not drained, order shards stop and
/// backpressure reaches [`PipelineRuntime::dispatch`].
///
/// `restored` carries the orders rebuilt from records dispatched with
/// output suppressed. They were delivered on `orders` by an earlier run and
/// are meant for local read models only.
pub struct RuntimeOutputs {
    pub orders: mpsc::Receiver<EmittedOrder>,
    pub restored: mpsc::UnboundedReceiver<EmittedOrder>,
    pub dead_letters: mpsc::UnboundedReceiver<DeadLetter>,
}

struct Envelope<T> {
    offset: Offset,
    /// False while replaying records whose output was already delivered.
    emit: bool,
    body: T,
}

enum OrderWork {
    LineItem(Keyed<EnrichedLineItemDetail>),
    Order(Keyed<EnrichedOrder>),
}

/// Acknowledges a flush with the index of the order shard that reached it.
type FlushAck = mpsc::UnboundedSender<usize>;

enum ReferenceMessage {
    Record(Envelope<InputRecord>),
    Flush(FlushAck),
}

enum OrderMessage {
    Work(Envelope<OrderWork>),
    Flush(FlushAck),
}

/// A running, sharded topology.
pub struct PipelineRuntime {
    reference_txs: Vec<mpsc::Sender<ReferenceMessage>>,
    reference_handles: Vec<JoinHandle<Result<()>>>,
    order_handles: Vec<JoinHandle<Result<()>>>,
}

impl PipelineRuntime {
    /// Starts the shards with in-memory stores.
    pub fn start(config: &PipelineConfig) -> (Self, RuntimeOutputs) {
        Self::start_with_stores(config, Arc::new(InMemoryStores))
    }

    /// Starts the shards, asking `stores` for the stores of each one.
    #[instrument(skip(config, stores), fields(shards = config.shard_count))]
    pub fn start_with_stores(
        config: &PipelineConfig,
        stores: Arc<dyn StoreProvider>,
    ) -> (Self, RuntimeOutputs) {
        let shard_count = config.shard_count.max(1);
        let capacity = config.channel_capacity.max(1);

        let (output_tx, output_rx) = mpsc::channel(capacity);
        let (restored_tx, restored_rx) = mpsc::unbounded_channel();
        let (dead_letter_tx, dead_letter_rx) = mpsc::unbounded_channel();

        let mut order_txs = Vec::with_capacity(shard_count);
        let mut order_handles = Vec::with_capacity(shard_count);
        for shard in 0..shard_count {
            let (tx, rx) = mpsc::unbounded_channel();
            let stage = OrderStage::from_provider(stores.as_ref(), shard);
            order_handles.push(tokio::spawn(run_order_shard(
                shard,
                stage,
                rx,
                OrderSinks {
                    output: output_tx.clone(),
                    restored: restored_tx.clone(),
                    dead_letters: dead_letter_tx.clone(),
                },
            )));
            order_txs.push(tx);
        }
        drop(output_tx);
        drop(restored_tx);

        let mut reference_txs = Vec::with_capacity(shard_count);
        let mut reference_handles = Vec::with_capacity(shard_count);
        for shard in 0..shard_count {
            let (tx, rx) = mpsc::channel(capacity);
            let stage = ReferenceStage::from_provider(stores.as_ref(), shard);
            reference_handles.push(tokio::spawn(run_reference_shard(
                shard,
                stage,
                rx,
                order_txs.clone(),
                dead_letter_tx.clone(),
            )));
            reference_txs.push(tx);
        }

        debug!(shard_count, "Pipeline started");

        (
            Self {
                reference_txs,
                reference_handles,
                order_handles,
            },
            RuntimeOutputs {
                orders: output_rx,
                restored: restored_rx,
                dead_letters: dead_letter_rx,
            },
        )
    }

    pub fn shard_count(&self) -> usize {
        self.reference_txs.len()
    }

    /// The reference shard `input` is routed to.
    pub fn shard_of(&self, input: &InputRecord) -> Result<usize> {
        Ok(shard_for(&routing_key(input)?, self.shard_count()))
    }

    /// Routes a record to its reference shard.
    ///
    /// Fails with [`TopologyError::MalformedKeyField`] when the record cannot
    /// be keyed for routing; nothing is dispatched in that case. With `emit`
    /// false the record updates state and any order it produces goes to
    /// [`RuntimeOutputs::restored`] instead of [`RuntimeOutputs::orders`].
    #[instrument(skip(self, input), fields(topic = %input.topic(), offset = %offset))]
    pub async fn dispatch(&self, input: InputRecord, offset: Offset, emit: bool) -> Result<()> {
        let shard = self.shard_of(&input)?;
        let topic = input.topic();

        self.reference_txs[shard]
            .send(ReferenceMessage::Record(Envelope {
                offset,
                emit,
                body: input,
            }))
            .await
            .map_err(|_| TopologyError::ShardUnavailable { shard })?;

        metrics::counter!("topology_records_dispatched_total", "topic" => topic.as_str())
            .increment(1);
        Ok(())
    }

    /// Waits until every record dispatched before the call has been
    /// processed by both stages.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<()> {
        let shard_count = self.shard_count();
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        for (shard, tx) in self.reference_txs.iter().enumerate() {
            tx.send(ReferenceMessage::Flush(ack_tx.clone()))
                .await
                .map_err(|_| TopologyError::ShardUnavailable { shard })?;
        }
        drop(ack_tx);

        // Each order shard acknowledges once per reference shard.
        let mut acks = vec![0usize; shard_count];
        let mut pending = shard_count * shard_count;
        while pending > 0 {
            let Some(order_shard) = ack_rx.recv().await else {
                let shard = acks.iter().position(|&n| n < shard_count).unwrap_or_default();
                return Err(TopologyError::ShardUnavailable { shard });
            };
            acks[order_shard] += 1;
            pending -= 1;
        }
        Ok(())
    }

    /// Stops accepting records, waits for every shard to drain and returns
    /// the first shard failure.
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            reference_txs,
            reference_handles,
            order_handles,
        } = self;
        drop(reference_txs);

        let mut first_error = None;
        for (shard, handle) in reference_handles.into_iter().enumerate() {
            collect_exit(shard, handle.await, &mut first_error);
        }
        for (shard, handle) in order_handles.into_iter().enumerate() {
            collect_exit(shard, handle.await, &mut first_error);
        }

        debug!("Pipeline stopped");
        first_error.map_or(Ok(()), Err)
    }
}

/// Maps a key to a shard index.
pub fn shard_for(key: &RecordKey, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % shard_count as u64) as usize
}

/// The key the reference stage will see the record under.
fn routing_key(input: &InputRecord) -> Result<RecordKey> {
    match input {
        InputRecord::Customer(r) => Ok(r.key.clone()),
        InputRecord::Product(r) => Ok(r.key.clone()),
        InputRecord::Order(r) => key_of(r, &rekey::ORDER_BY_CUSTOMER_ID),
        InputRecord::LineItem(r) => key_of(r, &rekey::LINE_ITEM_BY_PRODUCT_ID),
    }
}

fn collect_exit(
    shard: usize,
    exit: std::result::Result<Result<()>, tokio::task::JoinError>,
    first_error: &mut Option<TopologyError>,
) {
    let err = match exit {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e,
        Err(join_error) => {
            error!(shard, error = %join_error, "Shard task panicked");
            TopologyError::ShardUnavailable { shard }
        }
    };
    first_error.get_or_insert(err);
}

fn send_dead_letter(dead_letters: &mpsc::UnboundedSender<DeadLetter>, letter: DeadLetter) {
    warn!(topic = %letter.topic, offset = %letter.offset, error = %letter.error, "Record rejected");
    metrics::counter!("topology_dead_letters_total", "topic" => letter.topic.as_str()).increment(1);
    if dead_letters.send(letter).is_err() {
        debug!("Dead letter receiver dropped");
    }
}

async fn run_reference_shard(
    shard: usize,
    mut stage: ReferenceStage,
    mut rx: mpsc::Receiver<ReferenceMessage>,
    order_txs: Vec<mpsc::UnboundedSender<OrderMessage>>,
    dead_letters: mpsc::UnboundedSender<DeadLetter>,
) -> Result<()> {
    while let Some(message) = rx.recv().await {
        let Envelope { offset, emit, body } = match message {
            ReferenceMessage::Record(envelope) => envelope,
            ReferenceMessage::Flush(ack) => {
                for (target, tx) in order_txs.iter().enumerate() {
                    if tx.send(OrderMessage::Flush(ack.clone())).is_err() {
                        error!(shard, target, "Order shard is gone");
                        return Err(TopologyError::ShardUnavailable { shard: target });
                    }
                }
                continue;
            }
        };
        let topic = body.topic();
        let handoff = match body {
            InputRecord::Customer(record) => stage.apply_customer(record).map(|()| None),
            InputRecord::Product(record) => stage.apply_product(record).map(|()| None),
            InputRecord::Order(record) => stage
                .enrich_order(record)
                .map(|enriched| enriched.map(OrderWork::Order)),
            InputRecord::LineItem(record) => stage
                .enrich_line_item(record)
                .map(|detail| detail.map(OrderWork::LineItem)),
        };

        let work = match handoff {
            Ok(Some(work)) => work,
            Ok(None) => continue,
            Err(e) if e.is_record_error() => {
                send_dead_letter(
                    &dead_letters,
                    DeadLetter {
                        topic,
                        offset,
                        error: e.to_string(),
                    },
                );
                continue;
            }
            Err(e) => {
                error!(shard, error = %e, "Reference shard failed");
                return Err(e);
            }
        };

        let key = match &work {
            OrderWork::LineItem(detail) => &detail.key,
            OrderWork::Order(order) => &order.key,
        };
        let target = shard_for(key, order_txs.len());
        if order_txs[target]
            .send(OrderMessage::Work(Envelope {
                offset,
                emit,
                body: work,
            }))
            .is_err()
        {
            error!(shard, target, "Order shard is gone");
            return Err(TopologyError::ShardUnavailable { shard: target });
        }
    }

    debug!(shard, "Reference shard drained");
    Ok(())
}

struct OrderSinks {
    output: mpsc::Sender<EmittedOrder>,
    restored: mpsc::UnboundedSender<EmittedOrder>,
    dead_letters: mpsc::UnboundedSender<DeadLetter>,
}

async fn run_order_shard(
    shard: usize,
    mut stage: OrderStage,
    mut rx: mpsc::UnboundedReceiver<OrderMessage>,
    sinks: OrderSinks,
) -> Result<()> {
    while let Some(message) = rx.recv().await {
        let Envelope { offset, emit, body } = match message {
            OrderMessage::Work(envelope) => envelope,
            OrderMessage::Flush(ack) => {
                if ack.send(shard).is_err() {
                    debug!(shard, "Flush abandoned");
                }
                continue;
            }
        };
        let topic = match &body {
            OrderWork::LineItem(_) => Topic::OrderLineItems,
            OrderWork::Order(_) => Topic::Orders,
        };
        let result = match body {
            OrderWork::LineItem(detail) => stage.accumulate(detail).map(|_| None),
            OrderWork::Order(order) => stage.attach(order).map(Some),
        };

        match result {
            Ok(Some(order)) if emit => {
                debug!(
                    shard,
                    key = %order.key,
                    products = order.value.products.len(),
                    "Emitting enriched order"
                );
                sinks
                    .output
                    .send(EmittedOrder { offset, order })
                    .await
                    .map_err(|_| TopologyError::OutputClosed)?;
                metrics::counter!("topology_records_emitted_total").increment(1);
            }
            Ok(Some(order)) => {
                if sinks.restored.send(EmittedOrder { offset, order }).is_err() {
                    debug!(shard, "Restored order receiver dropped");
                }
            }
            Ok(None) => {}
            Err(e) if e.is_record_error() => {
                send_dead_letter(
                    &sinks.dead_letters,
                    DeadLetter {
                        topic,
                        offset,
                        error: e.to_string(),
                    },
                );
            }
            Err(e) => {
                error!(shard, error = %e, "Order shard failed");
                return Err(e);
            }
        }
    }

    debug!(shard, "Order shard drained");
    Ok(())
}
