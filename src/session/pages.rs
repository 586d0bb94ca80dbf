//! Deleted pages and rotation overrides of one session.
//!
//! State is keyed by `(file id, 1-based page number)`. Entries for files
//! that are later removed are left in place; file ids are never reused
//! and the tracker is dropped with its session.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{Result, StitchError};
use crate::ids::FileId;
use crate::rotation::Rotation;

/// Deleted page numbers per file, in a stable order for clients.
pub type DeletionSet = BTreeMap<FileId, BTreeSet<u32>>;

/// Page state of a single file, copied out for resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePageState {
    pub deleted: BTreeSet<u32>,
    pub rotations: HashMap<u32, Rotation>,
}

impl FilePageState {
    pub fn is_deleted(&self, page: u32) -> bool {
        self.deleted.contains(&page)
    }

    pub fn rotation_of(&self, page: u32) -> Rotation {
        self.rotations.get(&page).copied().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct PageStateTracker {
    deleted: HashMap<FileId, BTreeSet<u32>>,
    rotations: HashMap<FileId, HashMap<u32, Rotation>>,
}

impl PageStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_deleted(&self, file: &FileId, page: u32) -> bool {
        self.deleted
            .get(file)
            .is_some_and(|pages| pages.contains(&page))
    }

    /// Mark a page deleted. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Page numbers start at 1; page 0 is a validation error.
    pub fn mark_deleted(&mut self, file: &FileId, page: u32) -> Result<bool> {
        check_page(page)?;
        Ok(self.deleted.entry(file.clone()).or_default().insert(page))
    }

    pub fn rotation_of(&self, file: &FileId, page: u32) -> Rotation {
        self.rotations
            .get(file)
            .and_then(|pages| pages.get(&page))
            .copied()
            .unwrap_or_default()
    }

    /// Set (not add) a page's rotation.
    pub fn set_rotation(&mut self, file: &FileId, page: u32, rotation: Rotation) -> Result<()> {
        check_page(page)?;
        self.rotations
            .entry(file.clone())
            .or_default()
            .insert(page, rotation);
        Ok(())
    }

    /// Every deleted page, for client resynchronization.
    pub fn snapshot_deletions(&self) -> DeletionSet {
        self.deleted
            .iter()
            .filter(|(_, pages)| !pages.is_empty())
            .map(|(file, pages)| (file.clone(), pages.clone()))
            .collect()
    }

    /// Copy of one file's state.
    pub fn file_state(&self, file: &FileId) -> FilePageState {
        FilePageState {
            deleted: self.deleted.get(file).cloned().unwrap_or_default(),
            rotations: self.rotations.get(file).cloned().unwrap_or_default(),
        }
    }

    pub fn clear(&mut self) {
        self.deleted.clear();
        self.rotations.clear();
    }
}

pub(crate) fn check_page(page: u32) -> Result<()> {
    if page == 0 {
        return Err(StitchError::validation("page numbers start at 1"));
    }
    Ok(())
}
