//! Session-scoped state.
//!
//! A [`Session`] owns everything one client works with: the uploaded
//! files, which of their pages were deleted or rotated, and the merge
//! outputs it produced. Each map sits behind its own short critical
//! section; no lock is ever held across an `.await`.

pub mod manager;
pub mod pages;
pub mod registry;

pub use manager::SessionManager;
pub use pages::{DeletionSet, FilePageState, PageStateTracker};
pub use registry::{FileRegistry, SourceFile};

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::ids::{BlobId, FileId, SessionId};
use crate::rotation::Rotation;
use crate::store::BlobStore;

/// A merge result recorded on the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedOutput {
    pub blob_id: BlobId,
    pub file_name: String,
    pub page_count: usize,
    pub byte_size: u64,
}

/// One client's working set.
pub struct Session {
    id: SessionId,
    files: Mutex<FileRegistry>,
    pages: Mutex<PageStateTracker>,
    outputs: Mutex<HashMap<BlobId, MergedOutput>>,
    /// Bumped by every [`Session::clear`], under the `outputs` lock.
    epoch: AtomicU64,
    last_seen: Mutex<Instant>,
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("files", &self.files.lock().len())
            .field("outputs", &self.outputs.lock().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an empty session whose blobs live in `store`.
    pub fn new(id: SessionId, store: Arc<dyn BlobStore>) -> Self {
        Self {
            id,
            files: Mutex::new(FileRegistry::new()),
            pages: Mutex::new(PageStateTracker::new()),
            outputs: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            last_seen: Mutex::new(Instant::now()),
            store,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Blob store holding this session's uploads and outputs.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Record activity.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    // ---- files ----------------------------------------------------------

    /// Register an already stored blob as a source file.
    pub fn register_file(
        &self,
        display_name: impl Into<String>,
        blob_id: BlobId,
        byte_size: u64,
    ) -> SourceFile {
        let file = self.files.lock().register(display_name, blob_id, byte_size);
        tracing::debug!(
            session_id = %self.id,
            file_id = %file.id,
            name = %file.display_name,
            size = file.byte_size,
            "Registered source file"
        );
        file
    }

    pub fn lookup(&self, id: &FileId) -> Option<SourceFile> {
        self.files.lock().lookup(id).cloned()
    }

    /// Registered files in display order.
    pub fn files(&self) -> Vec<SourceFile> {
        self.files.lock().list().to_vec()
    }

    /// Remove a file and delete its blob.
    ///
    /// Returns whether the id was registered. A blob that cannot be
    /// deleted is logged; the file is unregistered regardless.
    pub async fn remove_file(&self, id: &FileId) -> bool {
        let Some(file) = self.files.lock().remove(id) else {
            return false;
        };
        self.delete_blob(&file.blob_id).await;
        tracing::info!(session_id = %self.id, file_id = %file.id, "Removed source file");
        true
    }

    /// Remove every file and delete their blobs. Returns how many were removed.
    pub async fn remove_all(&self) -> usize {
        let files = self.files.lock().drain();
        for file in &files {
            self.delete_blob(&file.blob_id).await;
        }
        files.len()
    }

    // ---- pages ----------------------------------------------------------

    pub fn is_deleted(&self, file: &FileId, page: u32) -> bool {
        self.pages.lock().is_deleted(file, page)
    }

    /// Mark a page deleted.
    ///
    /// Returns `true` only when the page was newly deleted. Pages of
    /// unregistered files are ignored.
    pub fn delete_page(&self, file: &FileId, page: u32) -> Result<bool> {
        if self.lookup(file).is_none() {
            tracing::debug!(session_id = %self.id, file_id = %file, page, "Ignoring delete for unknown file");
            pages::check_page(page)?;
            return Ok(false);
        }
        self.pages.lock().mark_deleted(file, page)
    }

    pub fn rotation_of(&self, file: &FileId, page: u32) -> Rotation {
        self.pages.lock().rotation_of(file, page)
    }

    /// Set a page's rotation. Returns `false` for unregistered files.
    pub fn set_rotation(&self, file: &FileId, page: u32, rotation: Rotation) -> Result<bool> {
        if self.lookup(file).is_none() {
            tracing::debug!(session_id = %self.id, file_id = %file, page, "Ignoring rotate for unknown file");
            pages::check_page(page)?;
            return Ok(false);
        }
        self.pages.lock().set_rotation(file, page, rotation)?;
        Ok(true)
    }

    pub fn snapshot_deletions(&self) -> DeletionSet {
        self.pages.lock().snapshot_deletions()
    }

    /// Copy of one file's page state.
    pub fn page_state(&self, file: &FileId) -> FilePageState {
        self.pages.lock().file_state(file)
    }

    // ---- outputs --------------------------------------------------------

    pub fn record_output(&self, output: MergedOutput) {
        self.outputs.lock().insert(output.blob_id.clone(), output);
    }

    /// Number of times the session has been cleared.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Record `output` only if the session has not been cleared since
    /// `epoch` was read. Returns whether it was recorded.
    pub fn record_output_since(&self, epoch: u64, output: MergedOutput) -> bool {
        let mut outputs = self.outputs.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        outputs.insert(output.blob_id.clone(), output);
        true
    }

    /// A merge output produced by this session.
    pub fn output(&self, blob_id: &BlobId) -> Option<MergedOutput> {
        self.outputs.lock().get(blob_id).cloned()
    }

    pub fn outputs(&self) -> Vec<MergedOutput> {
        self.outputs.lock().values().cloned().collect()
    }

    /// Drop every file, output and page state entry and delete their blobs.
    ///
    /// Merges that started before the call can no longer record an output.
    pub async fn clear(&self) {
        let outputs: Vec<_> = {
            let mut outputs = self.outputs.lock();
            self.epoch.fetch_add(1, Ordering::AcqRel);
            outputs.drain().map(|(id, _)| id).collect()
        };

        let removed_files = self.remove_all().await;
        for blob_id in &outputs {
            self.delete_blob(blob_id).await;
        }

        self.pages.lock().clear();

        tracing::info!(
            session_id = %self.id,
            files = removed_files,
            outputs = outputs.len(),
            "Cleared session"
        );
    }

    async fn delete_blob(&self, blob_id: &BlobId) {
        if let Err(err) = self.store.delete(blob_id).await {
            tracing::error!(
                session_id = %self.id,
                blob_id = %blob_id,
                error = %err,
                "Failed to delete blob"
            );
        }
    }
}
