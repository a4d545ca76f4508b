//! Grouping a re-keyed stream into one growing set per key.

use common::{Keyed, RecordKey};
use domain::OrderedSet;

use crate::store::{InMemoryStore, KeyValueStore};
use crate::table::TableView;
use crate::Result;

/// The outcome of one accumulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateUpdate<T> {
    pub key: RecordKey,
    /// The full set for `key` after the step.
    pub set: OrderedSet<T>,
    /// False when an equal element was already present.
    pub inserted: bool,
}

/// Groups events by key and accumulates their projections into an
/// [`OrderedSet`] per key.
///
/// A key's set starts empty on its first event and never shrinks.
pub struct GroupedSetAggregator<V, T> {
    store: Box<dyn KeyValueStore<OrderedSet<T>>>,
    project: fn(V) -> T,
}

impl<V, T: PartialEq + Clone> GroupedSetAggregator<V, T> {
    pub fn new(store: Box<dyn KeyValueStore<OrderedSet<T>>>, project: fn(V) -> T) -> Self {
        Self { store, project }
    }

    /// Adds one event to the set for its key and returns the updated set.
    pub fn accumulate(&mut self, event: Keyed<V>) -> Result<AggregateUpdate<T>> {
        let mut set = self.store.get(&event.key)?.unwrap_or_default();
        let inserted = set.insert((self.project)(event.value));
        self.store.put(event.key.clone(), set.clone())?;

        metrics::counter!(
            "topology_aggregate_updates_total",
            "store" => self.store.name().to_string()
        )
        .increment(1);
        tracing::trace!(key = %event.key, size = set.len(), inserted, "Aggregate updated");

        Ok(AggregateUpdate {
            key: event.key,
            set,
            inserted,
        })
    }

    /// Returns the current set for `key`, if any event was accumulated under it.
    pub fn current(&self, key: &RecordKey) -> Result<Option<OrderedSet<T>>> {
        self.store.get(key)
    }

    /// Number of keys with a set.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<V, T: Clone + Send + PartialEq + 'static> GroupedSetAggregator<V, T> {
    pub fn in_memory(name: impl Into<String>, project: fn(V) -> T) -> Self {
        Self::new(Box::new(InMemoryStore::new(name)), project)
    }
}

impl<V, T: PartialEq + Clone> TableView<OrderedSet<T>> for GroupedSetAggregator<V, T> {
    fn lookup(&self, key: &RecordKey) -> Result<Option<OrderedSet<T>>> {
        self.current(key)
    }
}
