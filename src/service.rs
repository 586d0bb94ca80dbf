//! Transport-facing operations.
//!
//! [`Workspace`] wires the session manager, the merge engine and the
//! configuration together. Each method maps onto one client action, and
//! the response types serialize to the JSON bodies the browser client
//! expects.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::codec::{LopdfCodec, PdfCodec};
use crate::config::Config;
use crate::download::{self, Download, DownloadLink, PDF_CONTENT_TYPE};
use crate::error::{Result, StitchError};
use crate::ids::{FileId, SessionId};
use crate::merge::{MergeEngine, MergePlan, MergePool, MergeRequest, MergeRequestBody};
use crate::rotation::Rotation;
use crate::session::{DeletionSet, Session, SessionManager, SourceFile};
use crate::store::BlobStore;

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Readers accept the header anywhere in the first KiB.
const HEADER_SCAN_LIMIT: usize = 1024;

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether this looks like a PDF by content type and header.
    pub fn is_pdf(&self) -> bool {
        let type_ok = self.content_type.as_deref().is_none_or(|value| {
            value
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        });
        let scan = &self.bytes[..self.bytes.len().min(HEADER_SCAN_LIMIT)];
        type_ok && scan.windows(PDF_MAGIC.len()).any(|window| window == PDF_MAGIC)
    }
}

/// Page reference in a delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRef {
    #[serde(alias = "filename")]
    pub file_id: FileId,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub success: bool,
    pub download_url: String,
    pub filename: String,
    pub pages: usize,
}

/// Failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl From<&StitchError> for ErrorResponse {
    fn from(err: &StitchError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}

/// Everything a transport needs to serve clients.
pub struct Workspace<C: PdfCodec = LopdfCodec> {
    sessions: SessionManager,
    engine: MergeEngine<C>,
    config: Config,
}

impl Workspace<LopdfCodec> {
    /// Build a workspace on the configured store.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or its store cannot be opened.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let store = config.open_store().await?;
        Ok(Self::with_codec(config, store, LopdfCodec::new()))
    }
}

impl<C: PdfCodec> Workspace<C> {
    pub fn with_codec(config: Config, store: Arc<dyn BlobStore>, codec: C) -> Self {
        let pool = MergePool::new(config.pool_capacity);
        Self {
            sessions: SessionManager::with_ttl(store, config.session_ttl),
            engine: MergeEngine::new(codec, pool, config.inline_page_merges),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn engine(&self) -> &MergeEngine<C> {
        &self.engine
    }

    /// Resolve the caller's session, creating one if `id` is unknown.
    pub fn session(&self, id: Option<&SessionId>) -> Arc<Session> {
        self.sessions.get_or_create(id)
    }

    /// Store and register uploaded PDFs.
    ///
    /// Non-PDF uploads are skipped. Sizes are checked before anything is
    /// stored, so an oversized upload leaves the session untouched.
    pub async fn upload(&self, session: &Session, uploads: Vec<Upload>) -> Result<UploadResponse> {
        let limit = self.config.max_upload_bytes;
        if let Some(big) = uploads.iter().find(|u| u.bytes.len() as u64 > limit) {
            tracing::warn!(
                session_id = %session.id(),
                file = %big.file_name,
                size = big.bytes.len(),
                limit,
                "Rejected oversized upload"
            );
            return Err(StitchError::validation(format!(
                "file too large, the limit is {} MB per file",
                self.config.max_upload_mb()
            )));
        }

        let mut files = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if !upload.is_pdf() {
                tracing::debug!(session_id = %session.id(), file = %upload.file_name, "Skipped non-PDF upload");
                continue;
            }
            let size = upload.bytes.len() as u64;
            let blob_id = session.store().put(upload.bytes).await?;
            files.push(session.register_file(upload.file_name, blob_id, size));
        }

        session.touch();
        Ok(UploadResponse {
            success: true,
            files,
        })
    }

    /// Registered files in display order.
    pub fn files(&self, session: &Session) -> Vec<SourceFile> {
        session.files()
    }

    /// Deleted pages per file, for client resynchronization.
    pub fn deleted_pages(&self, session: &Session) -> DeletionSet {
        session.snapshot_deletions()
    }

    /// Delete pages; returns how many were newly deleted.
    ///
    /// Every page number is checked before any state changes.
    pub fn delete_pages(&self, session: &Session, items: &[PageRef]) -> Result<DeleteResponse> {
        for item in items {
            crate::session::pages::check_page(item.page)?;
        }

        let mut deleted = 0;
        for item in items {
            if session.delete_page(&item.file_id, item.page)? {
                deleted += 1;
            }
        }
        Ok(DeleteResponse {
            success: true,
            deleted,
        })
    }

    /// Set the rotation of one page. Unknown files are a no-op.
    pub fn rotate_page(
        &self,
        session: &Session,
        file: &FileId,
        page: u32,
        degrees: i64,
    ) -> Result<Ack> {
        let rotation = Rotation::from_degrees(degrees)?;
        session.set_rotation(file, page, rotation)?;
        Ok(Ack::ok())
    }

    /// Remove files and their blobs.
    pub async fn delete_files(&self, session: &Session, ids: &[FileId]) -> Result<DeleteResponse> {
        if ids.is_empty() {
            return Err(StitchError::validation("no files selected"));
        }

        let mut deleted = 0;
        for id in ids {
            if session.remove_file(id).await {
                deleted += 1;
            }
        }
        Ok(DeleteResponse {
            success: true,
            deleted,
        })
    }

    /// Merge and report the download link.
    pub async fn merge(
        &self,
        session: Arc<Session>,
        body: MergeRequestBody,
    ) -> Result<MergeResponse> {
        let request = MergeRequest::try_from(body)?;
        let output = self.engine.merge(session, request).await?;
        Ok(MergeResponse {
            success: true,
            download_url: output.download_url(),
            filename: output.file_name,
            pages: output.page_count,
        })
    }

    /// Resolve a merge without running it.
    pub async fn plan(&self, session: &Session, body: MergeRequestBody) -> Result<MergePlan> {
        let request = MergeRequest::try_from(body)?;
        self.engine.plan(session, &request).await
    }

    /// Materialize a download from its URL.
    pub async fn download(
        &self,
        session: &Session,
        url: &str,
        name: Option<&str>,
    ) -> Result<Download> {
        let link = DownloadLink::parse(url)?;
        download::present(session, &link, name).await
    }

    /// Drop every file, output and page state of the session.
    pub async fn clear(&self, session: &Session) -> Ack {
        session.clear().await;
        Ack::ok()
    }

    /// Destroy a session. Returns whether it existed.
    pub async fn end_session(&self, id: &SessionId) -> bool {
        self.sessions.destroy(id).await
    }
}
