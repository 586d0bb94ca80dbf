//! Filesystem blob store.
//!
//! One file per blob under a root directory. Writes go to `<id>.tmp`
//! first and are renamed into place, so a reader never observes a
//! partially written blob.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::BlobStore;
use crate::error::{Result, StitchError};
use crate::ids::BlobId;

/// Blob store backed by a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.root.join(format!("{id}.pdf"))
    }
}

/// Write `bytes` to `<final_path>.tmp` and rename it over `final_path`.
/// The temp file is removed when either step fails.
async fn write_atomically(final_path: &Path, bytes: &[u8]) -> Result<()> {
    let write_path = final_path.with_extension("tmp");

    if let Err(err) = tokio::fs::write(&write_path, bytes).await {
        let _ = tokio::fs::remove_file(&write_path).await;
        return Err(StitchError::Io { source: err });
    }
    if let Err(err) = tokio::fs::rename(&write_path, final_path).await {
        let _ = tokio::fs::remove_file(&write_path).await;
        return Err(StitchError::Io { source: err });
    }
    Ok(())
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<BlobId> {
        let mut id = BlobId::generate();
        while tokio::fs::try_exists(self.blob_path(&id)).await? {
            id = BlobId::generate();
        }

        let final_path = self.blob_path(&id);
        write_atomically(&final_path, &bytes).await?;

        tracing::debug!(
            blob_id = %id,
            size = bytes.len(),
            path = %final_path.display(),
            "Stored blob on disk"
        );
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Vec<u8>>> {
        if !id.is_well_formed() {
            return Ok(None);
        }
        match tokio::fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, id: &BlobId) -> Result<bool> {
        if !id.is_well_formed() {
            return Ok(false);
        }
        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
