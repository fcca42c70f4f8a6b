//! Document store sinks
//!
//! A sink is opened once per run and shared by every worker, so all
//! operations take `&self` and must tolerate concurrent calls.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::hooks::Record;

pub mod memory;
pub mod mongo;

pub use memory::{MemoryBatch, MemorySink};
pub use mongo::{MongoConnection, MongoSink};

#[async_trait]
pub trait Sink: Send + Sync {
    /// Insert `records` in one call. Empty input is a no-op.
    async fn bulk_insert(&self, database: &str, collection: &str, records: Vec<Record>) -> Result<(), SinkError>;

    /// Replace the document matching each filter, inserting it if none matches.
    async fn upsert_batch(
        &self,
        database: &str,
        collection: &str,
        batch: Vec<(Record, Record)>,
    ) -> Result<(), SinkError>;

    /// Drop the collection entirely.
    async fn clear_collection(&self, database: &str, collection: &str) -> Result<(), SinkError>;
}
