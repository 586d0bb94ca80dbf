//! In-process blob store.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::BlobStore;
use crate::error::Result;
use crate::ids::BlobId;

/// Blob store that keeps every blob in memory.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<BlobId, Arc<Vec<u8>>>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds no blobs.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<BlobId> {
        let mut blobs = self.blobs.write().await;
        let mut id = BlobId::generate();
        while blobs.contains_key(&id) {
            id = BlobId::generate();
        }
        tracing::trace!(blob_id = %id, size = bytes.len(), "Stored blob in memory");
        blobs.insert(id.clone(), Arc::new(bytes));
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().await;
        Ok(blobs.get(id).map(|bytes| bytes.as_ref().clone()))
    }

    async fn delete(&self, id: &BlobId) -> Result<bool> {
        let mut blobs = self.blobs.write().await;
        Ok(blobs.remove(id).is_some())
    }
}
