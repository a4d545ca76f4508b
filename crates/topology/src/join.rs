//! Stream-table joins.

use common::Keyed;

use crate::table::TableView;
use crate::Result;

/// Joins events against the current value of a table under the event's key.
///
/// The join fires once per event arrival. A later table update does not
/// re-trigger events that already passed.
#[derive(Debug, Clone, Copy)]
pub struct StreamTableJoin {
    name: &'static str,
}

impl StreamTableJoin {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inner join: emits `joiner(event, current)` or drops the event when
    /// the table has no value for its key.
    ///
    /// The output keeps the event's key.
    pub fn inner<V, T, O>(
        &self,
        event: Keyed<V>,
        table: &impl TableView<T>,
        joiner: impl FnOnce(V, T) -> O,
    ) -> Result<Option<Keyed<O>>> {
        match table.lookup(&event.key)? {
            Some(current) => Ok(Some(event.map_value(|value| joiner(value, current)))),
            None => {
                metrics::counter!("topology_join_dropped_total", "join" => self.name)
                    .increment(1);
                tracing::debug!(
                    join = self.name,
                    key = %event.key,
                    "No table value, dropping event"
                );
                Ok(None)
            }
        }
    }

    /// Join that always emits, substituting `T::default()` when the table has
    /// no value for the event's key.
    pub fn or_default<V, T: Default, O>(
        &self,
        event: Keyed<V>,
        table: &impl TableView<T>,
        joiner: impl FnOnce(V, T) -> O,
    ) -> Result<Keyed<O>> {
        let current = table.lookup(&event.key)?.unwrap_or_default();
        Ok(event.map_value(|value| joiner(value, current)))
    }
}
