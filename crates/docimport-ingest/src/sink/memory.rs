//! In-process sink
//!
//! Keeps every written batch and the resulting collection contents in memory.
//! Backs `--dry-run` and the pipeline tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::Sink;
use crate::error::SinkError;
use crate::hooks::Record;

/// One write call as the sink received it
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBatch {
    pub database: String,
    pub collection: String,
    pub len: usize,
    pub upsert: bool,
}

type Namespace = (String, String);

#[derive(Default)]
struct State {
    batches: Vec<MemoryBatch>,
    cleared: Vec<Namespace>,
    collections: BTreeMap<Namespace, Vec<Record>>,
}

#[derive(Default)]
pub struct MemorySink {
    state: Mutex<State>,
    rejecting: Mutex<HashSet<Namespace>>,
}

fn namespace(database: &str, collection: &str) -> Namespace {
    (database.to_string(), collection.to_string())
}

fn matches(document: &Record, filter: &Record) -> bool {
    filter.iter().all(|(k, v)| document.get(k) == Some(v))
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every write to `database.collection` fail
    pub fn reject_writes(&self, database: &str, collection: &str) {
        self.rejecting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(namespace(database, collection));
    }

    fn check(&self, database: &str, collection: &str) -> Result<(), SinkError> {
        let rejecting = self.rejecting.lock().unwrap_or_else(PoisonError::into_inner);
        if rejecting.contains(&namespace(database, collection)) {
            return Err(SinkError::Rejected {
                database: database.to_string(),
                collection: collection.to_string(),
                message: "writes disabled".to_string(),
            });
        }
        Ok(())
    }

    /// Write calls in the order they were made
    pub fn batches(&self) -> Vec<MemoryBatch> {
        self.state().batches.clone()
    }

    /// Collections dropped, in order
    pub fn cleared(&self) -> Vec<(String, String)> {
        self.state().cleared.clone()
    }

    /// Current contents of a collection
    pub fn documents(&self, database: &str, collection: &str) -> Vec<Record> {
        self.state()
            .collections
            .get(&namespace(database, collection))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of documents across all collections
    pub fn total_documents(&self) -> usize {
        self.state().collections.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn bulk_insert(&self, database: &str, collection: &str, records: Vec<Record>) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        self.check(database, collection)?;

        let mut state = self.state();
        state.batches.push(MemoryBatch {
            database: database.to_string(),
            collection: collection.to_string(),
            len: records.len(),
            upsert: false,
        });
        debug!(database, collection, len = records.len(), "Stored batch in memory");
        state
            .collections
            .entry(namespace(database, collection))
            .or_default()
            .extend(records);
        Ok(())
    }

    async fn upsert_batch(
        &self,
        database: &str,
        collection: &str,
        batch: Vec<(Record, Record)>,
    ) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.check(database, collection)?;

        let mut state = self.state();
        state.batches.push(MemoryBatch {
            database: database.to_string(),
            collection: collection.to_string(),
            len: batch.len(),
            upsert: true,
        });
        let documents = state
            .collections
            .entry(namespace(database, collection))
            .or_default();
        for (filter, record) in batch {
            match documents.iter_mut().find(|d| matches(d, &filter)) {
                Some(existing) => *existing = record,
                None => documents.push(record),
            }
        }
        Ok(())
    }

    async fn clear_collection(&self, database: &str, collection: &str) -> Result<(), SinkError> {
        self.check(database, collection)?;

        let mut state = self.state();
        state.cleared.push(namespace(database, collection));
        state.collections.remove(&namespace(database, collection));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_upsert_and_clear() {
        let sink = MemorySink::new();
        sink.bulk_insert("db", "c", vec![]).await.unwrap();
        assert!(sink.batches().is_empty());

        sink.bulk_insert("db", "c", vec![rec(json!({"id": 1, "v": "a"}))])
            .await
            .unwrap();
        sink.upsert_batch(
            "db",
            "c",
            vec![
                (rec(json!({"id": 1})), rec(json!({"id": 1, "v": "b"}))),
                (rec(json!({"id": 2})), rec(json!({"id": 2, "v": "c"}))),
            ],
        )
        .await
        .unwrap();

        let docs = sink.documents("db", "c");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["v"], json!("b"));
        assert_eq!(sink.batches().len(), 2);
        assert!(sink.batches()[1].upsert);

        sink.clear_collection("db", "c").await.unwrap();
        assert!(sink.documents("db", "c").is_empty());
        assert_eq!(sink.cleared(), vec![("db".to_string(), "c".to_string())]);
    }

    #[tokio::test]
    async fn test_rejected_writes() {
        let sink = MemorySink::new();
        sink.reject_writes("db", "c");
        let err = sink
            .bulk_insert("db", "c", vec![rec(json!({"a": 1}))])
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Rejected { .. }));
        assert_eq!(sink.total_documents(), 0);
    }
}
