//! The order enrichment topology.
//!
//! This crate provides:
//! - [`KeyValueStore`], the keyed state abstraction behind tables and aggregates
//! - [`Table`], [`rekey`], [`StreamTableJoin`] and [`GroupedSetAggregator`] operators
//! - [`EnrichmentTopology`], the operators wired for a single thread of control
//! - [`PipelineRuntime`], the same topology sharded across tokio tasks
//! - [`EnrichmentProcessor`], which feeds the runtime from a changelog and
//!   rebuilds its state on restart

pub mod aggregate;
pub mod config;
pub mod error;
pub mod input;
pub mod join;
pub mod processor;
pub mod rekey;
pub mod runtime;
pub mod store;
pub mod table;
pub mod topology;

pub use aggregate::{AggregateUpdate, GroupedSetAggregator};
pub use config::PipelineConfig;
pub use error::{Result, TopologyError};
pub use input::InputRecord;
pub use join::StreamTableJoin;
pub use processor::{EnrichmentProcessor, RecoveryReport};
pub use rekey::{FieldSelector, rekey};
pub use runtime::{DeadLetter, EmittedOrder, PipelineRuntime, RuntimeOutputs};
pub use store::{InMemoryStore, InMemoryStores, KeyValueStore, StoreProvider};
pub use table::{Table, TableView};
pub use topology::{EnrichmentTopology, OrderStage, ReferenceStage};
