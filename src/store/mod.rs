//! Blob storage for uploaded sources and merge outputs.
//!
//! Blobs are opaque byte strings keyed by a generated [`BlobId`]. Every
//! `put` yields a fresh id, so concurrent writers never contend on the
//! same blob.
//!
//! # Examples
//!
//! ```no_run
//! use pdfstitch::store::{BlobStore, MemoryBlobStore};
//!
//! # async fn example() -> pdfstitch::Result<()> {
//! let store = MemoryBlobStore::new();
//! let id = store.put(b"%PDF-1.7".to_vec()).await?;
//! assert!(store.get(&id).await?.is_some());
//! assert!(store.delete(&id).await?);
//! # Ok(())
//! # }
//! ```

pub mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use crate::error::Result;
use crate::ids::BlobId;

/// Storage backend for blobs.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` under a freshly generated id.
    async fn put(&self, bytes: Vec<u8>) -> Result<BlobId>;

    /// Read a blob, `None` if it does not exist.
    async fn get(&self, id: &BlobId) -> Result<Option<Vec<u8>>>;

    /// Delete a blob. Returns whether anything was removed.
    async fn delete(&self, id: &BlobId) -> Result<bool>;
}
