//! Tables: the latest value per key, materialized from a changelog topic.

use common::{Keyed, RecordKey};

use crate::store::{InMemoryStore, KeyValueStore};
use crate::Result;

/// Read access to keyed state, as needed by a stream-table join.
pub trait TableView<V> {
    /// Returns the current value for `key`, if any.
    fn lookup(&self, key: &RecordKey) -> Result<Option<V>>;
}

/// A table over a keyed store.
///
/// Upserts replace the previous value and produce no output; the table
/// only answers lookups.
pub struct Table<V> {
    store: Box<dyn KeyValueStore<V>>,
}

impl<V> Table<V> {
    pub fn new(store: Box<dyn KeyValueStore<V>>) -> Self {
        Self { store }
    }

    /// Applies a table record: the record's value becomes the current value for its key.
    pub fn upsert(&mut self, record: Keyed<V>) -> Result<()> {
        tracing::trace!(table = self.store.name(), key = %record.key, "upsert");
        self.store.put(record.key, record.value)
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<V: Clone + Send + 'static> Table<V> {
    /// Creates a table backed by an [`InMemoryStore`].
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(Box::new(InMemoryStore::new(name)))
    }
}

impl<V> TableView<V> for Table<V> {
    fn lookup(&self, key: &RecordKey) -> Result<Option<V>> {
        self.store.get(key)
    }
}

impl<V> std::fmt::Debug for Table<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.store.name())
            .field("len", &self.store.len())
            .finish()
    }
}
