//! Persistence sinks: document upserts and snapshot blobs.

pub mod fs;
pub mod memory;
pub mod sqlite;
mod writer;

pub use fs::FsBlobStore;
pub use memory::{MemoryBlobStore, MemoryDocumentStore};
pub use sqlite::SqliteDocumentStore;
pub use writer::{BatchWriter, WriteOutcome, DOCUMENT_BATCH_CEILING};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Record;

/// Typed persistence failure.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("document store error: {0}")]
    Database(String),
    #[error("blob store error: {0}")]
    Blob(String),
}

/// Document sink keyed by `(entity_type, identity_key)`.
///
/// Upsert semantics are full-document-replace: each run is authoritative
/// for an entity's current snapshot, and re-running the job is idempotent.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or fully replace one batch of records.
    async fn upsert_batch(&self, records: &[Record]) -> Result<(), WriteError>;
}

/// Blob sink holding one "latest" snapshot object per logical source,
/// overwritten wholesale each run.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Overwrite the named object with JSON content.
    async fn put_json(&self, name: &str, body: &[u8]) -> Result<(), WriteError>;
}
