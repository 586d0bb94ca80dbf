//! Document assembly.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::task;

use super::{ConcurrencyClass, MergeJob, ResolvedPage, SourceCache};
use crate::codec::PdfCodec;
use crate::download::DownloadLink;
use crate::error::{Result, StitchError};
use crate::ids::{BlobId, SessionId};
use crate::store::BlobStore;

/// A finished merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutput {
    pub session_id: SessionId,
    pub blob_id: BlobId,
    pub file_name: String,
    pub page_count: usize,
    pub byte_size: u64,
    pub class: ConcurrencyClass,
}

impl MergeOutput {
    pub fn download_link(&self) -> DownloadLink {
        DownloadLink::new(self.session_id.clone(), self.blob_id.clone())
    }

    pub fn download_url(&self) -> String {
        self.download_link().url()
    }
}

/// Default output name, `merged-<unix millis>.pdf`.
pub fn default_output_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("merged-{millis}.pdf")
}

/// Copies resolved pages into a new document and stores it.
pub struct MergeExecutor<C: PdfCodec> {
    codec: Arc<C>,
}

impl<C: PdfCodec> MergeExecutor<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self { codec }
    }

    /// Assemble `job` and persist the result as one new blob.
    ///
    /// Nothing is stored unless every page was copied and the output
    /// serialized.
    ///
    /// # Errors
    ///
    /// Codec errors from copying or serializing, I/O errors from the store.
    pub async fn execute(
        &self,
        job: MergeJob<C>,
        store: &Arc<dyn BlobStore>,
        class: ConcurrencyClass,
    ) -> Result<MergeOutput> {
        let start = Instant::now();
        let MergeJob {
            session_id,
            pages,
            sources,
        } = job;
        let page_count = pages.len();

        let codec = Arc::clone(&self.codec);
        let bytes = task::spawn_blocking(move || assemble(codec.as_ref(), &pages, &sources))
            .await
            .map_err(|e| StitchError::job_failed(format!("Assembly task failed: {e}")))??;
        let byte_size = bytes.len() as u64;

        let blob_id = store.put(bytes).await?;

        tracing::debug!(
            session_id = %session_id,
            blob_id = %blob_id,
            pages = page_count,
            size = byte_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stored merged document"
        );

        Ok(MergeOutput {
            session_id,
            blob_id,
            file_name: default_output_name(),
            page_count,
            byte_size,
            class,
        })
    }
}

/// Build the output document page by page, in order.
fn assemble<C: PdfCodec>(
    codec: &C,
    pages: &[ResolvedPage],
    sources: &SourceCache<C>,
) -> Result<Vec<u8>> {
    let mut output = codec.create_output();

    for page in pages {
        let source = sources.get(&page.file.id).ok_or_else(|| {
            StitchError::job_failed(format!("source {} was not resolved", page.file.id))
        })?;

        let copied = codec.copy_page(&mut output, source, page.page_index)?;
        // Identity keeps whatever orientation the source page had.
        if !page.rotation.is_identity() {
            codec.set_rotation(&mut output, copied, page.rotation)?;
        }
        codec.append_page(&mut output, copied)?;
    }

    codec.serialize(output)
}
