//! Per-session file registry.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::ids::{BlobId, FileId};
use crate::utils::natural_cmp;

/// An uploaded source document owned by one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Id handed out at upload.
    pub id: FileId,
    /// Original file name as uploaded.
    pub display_name: String,
    /// Where the bytes live.
    pub blob_id: BlobId,
    /// Upload size in bytes.
    pub byte_size: u64,
}

/// Files of one session, kept in natural display-name order.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: Vec<SourceFile>,
    /// Every id this registry ever handed out, removed or not.
    issued: HashSet<FileId>,
}

impl FileRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stored blob and return the new entry.
    ///
    /// The entry is inserted after every entry whose name sorts before or
    /// equal to `display_name`, so equal names keep upload order.
    pub fn register(
        &mut self,
        display_name: impl Into<String>,
        blob_id: BlobId,
        byte_size: u64,
    ) -> SourceFile {
        let mut id = FileId::generate();
        while self.issued.contains(&id) {
            id = FileId::generate();
        }
        self.issued.insert(id.clone());

        let file = SourceFile {
            id,
            display_name: display_name.into(),
            blob_id,
            byte_size,
        };

        let position = self.files.partition_point(|existing| {
            natural_cmp(&existing.display_name, &file.display_name) != Ordering::Greater
        });
        self.files.insert(position, file.clone());
        file
    }

    /// Remove an entry, returning it if it was registered.
    pub fn remove(&mut self, id: &FileId) -> Option<SourceFile> {
        let position = self.files.iter().position(|file| &file.id == id)?;
        Some(self.files.remove(position))
    }

    /// Remove and return every entry.
    pub fn drain(&mut self) -> Vec<SourceFile> {
        std::mem::take(&mut self.files)
    }

    pub fn lookup(&self, id: &FileId) -> Option<&SourceFile> {
        self.files.iter().find(|file| &file.id == id)
    }

    /// Entries in display order.
    pub fn list(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
