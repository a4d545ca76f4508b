//! Append-only changelog for the order enrichment pipeline.
//!
//! Every record ingested by the pipeline lands here first, under one global
//! offset sequence. Tables and aggregates are rebuilt by replaying the log;
//! consumer [`Checkpoint`]s record how far output has been delivered.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use checkpoint::Checkpoint;
pub use error::{ChangelogError, Result};
pub use memory::InMemoryChangelog;
pub use postgres::PostgresChangelog;
pub use record::{LogRecord, LogRecordBuilder, Offset, Topic};
pub use store::{ChangelogStore, ChangelogStoreExt, RecordStream};
