//! In-memory stores for dry runs and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BlobStore, DocumentStore, WriteError};
use crate::models::Record;

/// Document store holding records in a map, keyed like the real store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<BTreeMap<(String, String), Record>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn get(&self, entity_type: &str, identity_key: &str) -> Option<Record> {
        self.docs
            .lock()
            .await
            .get(&(entity_type.to_string(), identity_key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn upsert_batch(&self, records: &[Record]) -> Result<(), WriteError> {
        let mut docs = self.docs.lock().await;
        for record in records {
            docs.insert(
                (record.entity_type.clone(), record.identity_key.clone()),
                record.clone(),
            );
        }
        Ok(())
    }
}

/// Blob store holding snapshot objects in a map.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_json(&self, name: &str, body: &[u8]) -> Result<(), WriteError> {
        self.objects
            .lock()
            .await
            .insert(name.to_string(), body.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str) -> Record {
        Record::new(key.to_string(), "type_x".to_string(), BTreeMap::new())
    }

    #[tokio::test]
    async fn test_memory_document_store_upserts() {
        let store = MemoryDocumentStore::new();
        store
            .upsert_batch(&[record("A"), record("B"), record("A")])
            .await
            .unwrap();
        assert_eq!(store.count().await, 2);
        assert!(store.get("type_x", "A").await.is_some());
        assert!(store.get("type_y", "A").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_blob_store_overwrites() {
        let store = MemoryBlobStore::new();
        store.put_json("snap.json", b"old").await.unwrap();
        store.put_json("snap.json", b"new").await.unwrap();
        assert_eq!(store.get("snap.json").await.unwrap(), b"new");
        assert_eq!(store.names().await, vec!["snap.json".to_string()]);
    }
}
