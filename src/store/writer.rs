//! Chunked, idempotent batch commits to the document and blob sinks.

use tracing::{info, warn};

use super::{BlobStore, DocumentStore, WriteError};
use crate::models::Record;

/// Records per upsert batch. The reference document store caps a
/// transactional batch at 500 writes, so commits stay one under it.
pub const DOCUMENT_BATCH_CEILING: usize = 499;

/// What one source's commit achieved.
#[derive(Debug)]
pub struct WriteOutcome {
    /// Records successfully upserted.
    pub written: usize,
    /// Batches committed.
    pub chunks: usize,
    /// Whether the consolidated snapshot was written.
    pub snapshot_written: bool,
    /// First failure encountered, if any.
    pub error: Option<WriteError>,
}

/// Commits normalized records for one source: fixed-size upsert chunks to
/// the document store, then one consolidated JSON snapshot to the blob
/// store.
pub struct BatchWriter<'a> {
    docs: &'a dyn DocumentStore,
    blobs: &'a dyn BlobStore,
    chunk_size: usize,
}

impl<'a> BatchWriter<'a> {
    pub fn new(docs: &'a dyn DocumentStore, blobs: &'a dyn BlobStore) -> Self {
        Self {
            docs,
            blobs,
            chunk_size: DOCUMENT_BATCH_CEILING,
        }
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Commit all records for one source.
    ///
    /// A chunk failure aborts the remaining chunks but the snapshot write
    /// is still attempted: the blob holds whatever this run gathered even
    /// when the document store is unavailable.
    pub async fn commit(&self, records: &[Record], entity_type: &str) -> WriteOutcome {
        let mut outcome = WriteOutcome {
            written: 0,
            chunks: 0,
            snapshot_written: false,
            error: None,
        };

        for chunk in records.chunks(self.chunk_size) {
            match self.docs.upsert_batch(chunk).await {
                Ok(()) => {
                    outcome.written += chunk.len();
                    outcome.chunks += 1;
                }
                Err(err) => {
                    warn!(
                        "Batch commit failed for {} after {} records: {}",
                        entity_type, outcome.written, err
                    );
                    outcome.error = Some(err);
                    break;
                }
            }
        }

        let snapshot_name = format!("{}_latest.json", entity_type);
        match serde_json::to_vec_pretty(records) {
            Ok(body) => match self.blobs.put_json(&snapshot_name, &body).await {
                Ok(()) => outcome.snapshot_written = true,
                Err(err) => {
                    warn!("Snapshot write failed for {}: {}", entity_type, err);
                    if outcome.error.is_none() {
                        outcome.error = Some(err);
                    }
                }
            },
            Err(err) => {
                warn!("Snapshot serialization failed for {}: {}", entity_type, err);
                if outcome.error.is_none() {
                    outcome.error = Some(WriteError::Blob(err.to_string()));
                }
            }
        }

        info!(
            "Committed {} records for {} in {} chunks",
            outcome.written, entity_type, outcome.chunks
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBlobStore, MemoryDocumentStore};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut fields = BTreeMap::new();
                fields.insert("registration_no".to_string(), format!("R{}", i));
                Record::new(format!("R{}", i), "type_x".to_string(), fields)
            })
            .collect()
    }

    /// Captures the size of each committed chunk.
    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn upsert_batch(&self, records: &[Record]) -> Result<(), WriteError> {
            self.batches.lock().await.push(records.len());
            Ok(())
        }
    }

    /// Fails every batch after the first N.
    struct FlakyStore {
        allowed: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn upsert_batch(&self, _records: &[Record]) -> Result<(), WriteError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.allowed {
                Ok(())
            } else {
                Err(WriteError::Database("store unavailable".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_thousand_records_commit_in_three_chunks() {
        let docs = RecordingStore::default();
        let blobs = MemoryBlobStore::new();
        let writer = BatchWriter::new(&docs, &blobs);

        let outcome = writer.commit(&records(1000), "type_x").await;

        assert_eq!(outcome.written, 1000);
        assert_eq!(outcome.chunks, 3);
        assert!(outcome.error.is_none());
        assert_eq!(*docs.batches.lock().await, vec![499, 499, 2]);
    }

    #[tokio::test]
    async fn test_chunk_failure_aborts_remaining_but_snapshot_still_written() {
        let docs = FlakyStore {
            allowed: 1,
            calls: AtomicUsize::new(0),
        };
        let blobs = MemoryBlobStore::new();
        let writer = BatchWriter::new(&docs, &blobs).with_chunk_size(2);

        let outcome = writer.commit(&records(6), "type_x").await;

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.chunks, 1);
        assert!(matches!(outcome.error, Some(WriteError::Database(_))));
        // Only two batch attempts: one success, one failure, no third.
        assert_eq!(docs.calls.load(Ordering::SeqCst), 2);
        assert!(outcome.snapshot_written);
        assert!(blobs.get("type_x_latest.json").await.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_contains_all_records_as_json_array() {
        let docs = MemoryDocumentStore::new();
        let blobs = MemoryBlobStore::new();
        let writer = BatchWriter::new(&docs, &blobs);

        let outcome = writer.commit(&records(3), "type_y").await;
        assert!(outcome.snapshot_written);

        let body = blobs.get("type_y_latest.json").await.unwrap();
        let parsed: Vec<Record> = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(docs.count().await, 3);
    }
}
