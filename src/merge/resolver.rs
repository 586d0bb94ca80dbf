//! Request resolution.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task;

use super::{MergeRequest, PageItem, ResolvedPage};
use crate::codec::PdfCodec;
use crate::error::{Result, StitchError};
use crate::ids::{FileId, SessionId};
use crate::session::{Session, SourceFile};
use crate::store::BlobStore;

/// Parsed sources of one job, keyed by file id.
///
/// Filled by the resolver and handed to the executor, so each source is
/// parsed once per job no matter how many of its pages are used.
pub struct SourceCache<C: PdfCodec> {
    sources: HashMap<FileId, Arc<C::Source>>,
}

impl<C: PdfCodec> Default for SourceCache<C> {
    fn default() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }
}

impl<C: PdfCodec> SourceCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file: &FileId) -> Option<&Arc<C::Source>> {
        self.sources.get(file)
    }

    pub fn insert(&mut self, file: FileId, source: Arc<C::Source>) {
        self.sources.insert(file, source);
    }

    /// Number of distinct sources parsed.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Outcome of tolerant resolution, not yet checked for emptiness.
pub struct Resolution<C: PdfCodec> {
    pub pages: Vec<ResolvedPage>,
    pub sources: SourceCache<C>,
    /// Request items dropped because their file or blob was gone.
    pub skipped: usize,
}

impl<C: PdfCodec> Resolution<C> {
    /// Turn the resolution into a runnable job.
    ///
    /// # Errors
    ///
    /// Returns a validation error if nothing resolved.
    pub fn into_job(self, session_id: SessionId) -> Result<MergeJob<C>> {
        if self.pages.is_empty() {
            return Err(StitchError::validation("nothing to merge"));
        }
        Ok(MergeJob {
            session_id,
            pages: self.pages,
            sources: self.sources,
        })
    }
}

/// A resolved, non-empty merge.
pub struct MergeJob<C: PdfCodec> {
    pub session_id: SessionId,
    pub pages: Vec<ResolvedPage>,
    pub sources: SourceCache<C>,
}

/// Resolves requests against a session's files and page state.
pub struct MergeResolver<C: PdfCodec> {
    codec: Arc<C>,
}

impl<C: PdfCodec> MergeResolver<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self { codec }
    }

    /// Resolve `request` into an ordered page list.
    ///
    /// Unknown file ids and files whose blob disappeared are skipped with a
    /// warning. A source that fails to parse aborts the resolution.
    pub async fn resolve(&self, session: &Session, request: &MergeRequest) -> Result<Resolution<C>> {
        let mut resolution = Resolution {
            pages: Vec::new(),
            sources: SourceCache::new(),
            skipped: 0,
        };

        match request {
            MergeRequest::Pages(items) => {
                for item in items {
                    self.resolve_page(session, item, &mut resolution).await?;
                }
            }
            MergeRequest::Files(ids) => {
                for id in ids {
                    self.resolve_file(session, id, &mut resolution).await?;
                }
            }
        }

        tracing::debug!(
            session_id = %session.id(),
            kind = request.kind(),
            items = request.len(),
            pages = resolution.pages.len(),
            sources = resolution.sources.len(),
            skipped = resolution.skipped,
            "Resolved merge request"
        );
        Ok(resolution)
    }

    async fn resolve_page(
        &self,
        session: &Session,
        item: &PageItem,
        resolution: &mut Resolution<C>,
    ) -> Result<()> {
        let Some((file, source)) = self.open(session, &item.file_id, resolution).await? else {
            resolution.skipped += 1;
            return Ok(());
        };

        let page_count = self.codec.page_count(&source);
        if page_count == 0 {
            tracing::warn!(session_id = %session.id(), file_id = %file.id, "Skipping page of empty document");
            resolution.skipped += 1;
            return Ok(());
        }

        let last_index = i64::try_from(page_count - 1).unwrap_or(i64::MAX);
        let page_index = item.page.saturating_sub(1).clamp(0, last_index);

        resolution.pages.push(ResolvedPage {
            file,
            page_index: usize::try_from(page_index).unwrap_or_default(),
            rotation: item.rotation,
        });
        Ok(())
    }

    async fn resolve_file(
        &self,
        session: &Session,
        id: &FileId,
        resolution: &mut Resolution<C>,
    ) -> Result<()> {
        let Some((file, source)) = self.open(session, id, resolution).await? else {
            resolution.skipped += 1;
            return Ok(());
        };

        let state = session.page_state(id);
        for page_index in 0..self.codec.page_count(&source) {
            let page_number = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
            if state.is_deleted(page_number) {
                continue;
            }
            resolution.pages.push(ResolvedPage {
                file: file.clone(),
                page_index,
                rotation: state.rotation_of(page_number),
            });
        }
        Ok(())
    }

    /// Look up and parse a file, reusing the job's cache.
    ///
    /// Returns `None` if the file is not registered or its blob is gone.
    async fn open(
        &self,
        session: &Session,
        id: &FileId,
        resolution: &mut Resolution<C>,
    ) -> Result<Option<(SourceFile, Arc<C::Source>)>> {
        let Some(file) = session.lookup(id) else {
            tracing::warn!(session_id = %session.id(), file_id = %id, "Skipping unknown file");
            return Ok(None);
        };

        if let Some(source) = resolution.sources.get(id) {
            return Ok(Some((file, Arc::clone(source))));
        }

        let Some(bytes) = session.store().get(&file.blob_id).await? else {
            tracing::warn!(
                session_id = %session.id(),
                file_id = %id,
                blob_id = %file.blob_id,
                "Skipping file whose blob is missing"
            );
            return Ok(None);
        };

        let codec = Arc::clone(&self.codec);
        let source = task::spawn_blocking(move || codec.open(&bytes))
            .await
            .map_err(|e| StitchError::job_failed(format!("Parse task failed: {e}")))?
            .map_err(|err| {
                tracing::error!(
                    session_id = %session.id(),
                    file_id = %id,
                    name = %file.display_name,
                    error = %err,
                    "Failed to parse source"
                );
                err
            })?;

        let source = Arc::new(source);
        resolution.sources.insert(id.clone(), Arc::clone(&source));
        Ok(Some((file, source)))
    }
}
