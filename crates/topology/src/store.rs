//! Keyed state stores backing tables and aggregates.

use std::collections::HashMap;

use common::RecordKey;
use domain::{Customer, Product, ProductSet};

use crate::Result;

/// A keyed store holding the latest value per key.
///
/// Stores are owned by a single shard, so access is `&mut` and
/// synchronous. Failures surface as [`crate::TopologyError::StateStoreUnavailable`].
pub trait KeyValueStore<V>: Send {
    /// Name of the store, used in errors and logs.
    fn name(&self) -> &str;

    /// Returns a copy of the value stored under `key`.
    fn get(&self, key: &RecordKey) -> Result<Option<V>>;

    /// Inserts or replaces the value stored under `key`.
    fn put(&mut self, key: RecordKey, value: V) -> Result<()>;

    /// Returns the number of keys held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`KeyValueStore`] held in a `HashMap`.
#[derive(Debug, Clone)]
pub struct InMemoryStore<V> {
    name: String,
    entries: HashMap<RecordKey, V>,
}

impl<V> InMemoryStore<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone + Send> KeyValueStore<V> for InMemoryStore<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &RecordKey) -> Result<Option<V>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: RecordKey, value: V) -> Result<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Creates the stores of one shard.
///
/// The runtime asks the provider for a fresh set of stores per shard, so
/// no store is ever shared between shards.
pub trait StoreProvider: Send + Sync {
    fn customers(&self, shard: usize) -> Box<dyn KeyValueStore<Customer>>;

    fn products(&self, shard: usize) -> Box<dyn KeyValueStore<Product>>;

    fn line_items(&self, shard: usize) -> Box<dyn KeyValueStore<ProductSet>>;
}

/// Provides [`InMemoryStore`]s named after their shard.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryStores;

impl StoreProvider for InMemoryStores {
    fn customers(&self, shard: usize) -> Box<dyn KeyValueStore<Customer>> {
        Box::new(InMemoryStore::new(format!("customers-{shard}")))
    }

    fn products(&self, shard: usize) -> Box<dyn KeyValueStore<Product>> {
        Box::new(InMemoryStore::new(format!("products-{shard}")))
    }

    fn line_items(&self, shard: usize) -> Box<dyn KeyValueStore<ProductSet>> {
        Box::new(InMemoryStore::new(format!("order-line-items-{shard}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_replaces_previous_value() {
        let mut store = InMemoryStore::new("test");
        store.put(RecordKey::new("a"), 1).unwrap();
        store.put(RecordKey::new("a"), 2).unwrap();

        assert_eq!(store.get(&RecordKey::new("a")).unwrap(), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_key() {
        let store: InMemoryStore<u32> = InMemoryStore::new("test");
        assert_eq!(store.get(&RecordKey::new("missing")).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_provider_names_stores_by_shard() {
        let provider = InMemoryStores;
        assert_eq!(provider.customers(0).name(), "customers-0");
        assert_eq!(provider.products(3).name(), "products-3");
        assert_eq!(provider.line_items(1).name(), "order-line-items-1");
    }
}
