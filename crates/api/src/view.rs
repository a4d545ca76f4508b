//! Enriched orders view: the latest emitted value per order id.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use changelog::Offset;
use domain::EnrichedOrder;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use topology::{DeadLetter, EmittedOrder, RuntimeOutputs};

/// Most recent dead letters kept for inspection.
const DEAD_LETTER_LIMIT: usize = 1000;

struct ViewState {
    orders: HashMap<String, EnrichedOrder>,
    dead_letters: VecDeque<DeadLetter>,
    last_offset: Offset,
}

/// Read model over the pipeline output.
///
/// Each emitted or restored order replaces the previous value for its
/// order id, so the view survives a restart of the pipeline.
#[derive(Clone)]
pub struct EnrichedOrdersView {
    state: Arc<RwLock<ViewState>>,
}

impl EnrichedOrdersView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewState {
                orders: HashMap::new(),
                dead_letters: VecDeque::with_capacity(DEAD_LETTER_LIMIT),
                last_offset: Offset::initial(),
            })),
        }
    }

    pub async fn apply(&self, emitted: EmittedOrder) {
        let mut state = self.state.write().await;
        state.last_offset = state.last_offset.max(emitted.offset);
        state
            .orders
            .insert(emitted.order.key.into_string(), emitted.order.value);
    }

    pub async fn record_dead_letter(&self, letter: DeadLetter) {
        let mut state = self.state.write().await;
        if state.dead_letters.len() == DEAD_LETTER_LIMIT {
            state.dead_letters.pop_front();
        }
        state.dead_letters.push_back(letter);
    }

    pub async fn get(&self, order_id: &str) -> Option<EnrichedOrder> {
        self.state.read().await.orders.get(order_id).cloned()
    }

    /// All orders, sorted by id.
    pub async fn all(&self) -> Vec<EnrichedOrder> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        orders
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.read().await.dead_letters.iter().cloned().collect()
    }

    /// Offset of the newest order record reflected in the view.
    pub async fn last_offset(&self) -> Offset {
        self.state.read().await.last_offset
    }

    /// Feeds the view from the pipeline outputs until every channel closes.
    pub fn spawn(&self, outputs: RuntimeOutputs) -> JoinHandle<()> {
        let view = self.clone();
        let RuntimeOutputs {
            mut orders,
            mut restored,
            mut dead_letters,
        } = outputs;

        tokio::spawn(async move {
            let mut orders_open = true;
            let mut restored_open = true;
            let mut dead_letters_open = true;
            while orders_open || restored_open || dead_letters_open {
                tokio::select! {
                    emitted = orders.recv(), if orders_open => match emitted {
                        Some(emitted) => view.apply(emitted).await,
                        None => orders_open = false,
                    },
                    emitted = restored.recv(), if restored_open => match emitted {
                        Some(emitted) => view.apply(emitted).await,
                        None => restored_open = false,
                    },
                    letter = dead_letters.recv(), if dead_letters_open => match letter {
                        Some(letter) => view.record_dead_letter(letter).await,
                        None => dead_letters_open = false,
                    },
                }
            }
            tracing::debug!("Pipeline outputs closed");
        })
    }
}

impl Default for EnrichedOrdersView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use changelog::Topic;
    use common::Keyed;
    use domain::{Customer, Order, enrich_order};

    fn emitted(offset: i64, order_id: &str, name: &str) -> EmittedOrder {
        let order = enrich_order(Order::new(order_id, "c1"), &Customer::new("c1", name));
        EmittedOrder {
            offset: Offset::new(offset),
            order: Keyed::new(order_id, order),
        }
    }

    #[tokio::test]
    async fn test_latest_emission_wins() {
        let view = EnrichedOrdersView::new();
        view.apply(emitted(3, "o1", "Alice")).await;
        view.apply(emitted(7, "o1", "Alicia")).await;

        assert_eq!(view.get("o1").await.unwrap().customer_name, "Alicia");
        assert_eq!(view.all().await.len(), 1);
        assert_eq!(view.last_offset().await, Offset::new(7));
    }

    #[tokio::test]
    async fn test_all_is_sorted_by_id() {
        let view = EnrichedOrdersView::new();
        view.apply(emitted(1, "o2", "Alice")).await;
        view.apply(emitted(2, "o1", "Alice")).await;

        let ids: Vec<_> = view.all().await.into_iter().map(|o| o.id).collect();
        assert_eq!(ids, ["o1", "o2"]);
        assert!(view.get("o3").await.is_none());
    }

    #[tokio::test]
    async fn test_spawn_applies_emitted_and_restored_orders() {
        let (orders_tx, orders) = tokio::sync::mpsc::channel(4);
        let (restored_tx, restored) = tokio::sync::mpsc::unbounded_channel();
        let (_, dead_letters) = tokio::sync::mpsc::unbounded_channel();

        let view = EnrichedOrdersView::new();
        let task = view.spawn(RuntimeOutputs {
            orders,
            restored,
            dead_letters,
        });

        restored_tx.send(emitted(2, "o1", "Alice")).unwrap();
        orders_tx.send(emitted(5, "o2", "Bob")).await.unwrap();
        drop(restored_tx);
        drop(orders_tx);
        task.await.unwrap();

        assert_eq!(view.get("o1").await.unwrap().customer_name, "Alice");
        assert_eq!(view.get("o2").await.unwrap().customer_name, "Bob");
        assert_eq!(view.last_offset().await, Offset::new(5));
    }

    #[tokio::test]
    async fn test_dead_letters_are_capped() {
        let view = EnrichedOrdersView::new();
        for i in 0..(DEAD_LETTER_LIMIT as i64 + 5) {
            view.record_dead_letter(DeadLetter {
                topic: Topic::Orders,
                offset: Offset::new(i + 1),
                error: "bad".to_string(),
            })
            .await;
        }

        let letters = view.dead_letters().await;
        assert_eq!(letters.len(), DEAD_LETTER_LIMIT);
        assert_eq!(letters[0].offset, Offset::new(6));
    }
}
