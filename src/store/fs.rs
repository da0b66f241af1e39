//! Filesystem-backed blob store for snapshot objects.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::{BlobStore, WriteError};

/// Writes snapshot objects as files under a root directory.
///
/// Holds "latest" only, not history: an object with the same name is
/// overwritten on every run.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Filesystem path for a named object.
    pub fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_json(&self, name: &str, body: &[u8]) -> Result<(), WriteError> {
        let path = self.object_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WriteError::Blob(e.to_string()))?;
        }
        std::fs::write(&path, body).map_err(|e| WriteError::Blob(e.to_string()))?;
        info!("Snapshot written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_json_writes_object() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf());

        store
            .put_json("type_x_latest.json", b"[{\"a\":1}]")
            .await
            .unwrap();

        let body = std::fs::read(store.object_path("type_x_latest.json")).unwrap();
        assert_eq!(body, b"[{\"a\":1}]");
    }

    #[tokio::test]
    async fn test_put_json_overwrites_prior_snapshot() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf());

        store.put_json("snap.json", b"old").await.unwrap();
        store.put_json("snap.json", b"new").await.unwrap();

        let body = std::fs::read(store.object_path("snap.json")).unwrap();
        assert_eq!(body, b"new");
    }

    #[tokio::test]
    async fn test_put_json_creates_nested_directories() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("snapshots"));
        store.put_json("registry/type_x.json", b"[]").await.unwrap();
        assert!(store.object_path("registry/type_x.json").exists());
    }
}
