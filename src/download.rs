//! Named downloads of merge outputs.
//!
//! A merge output is addressed by a [`DownloadLink`]
//! (`/download/<session id>/<blob id>`). [`present`] checks that the
//! requester owns the link before touching storage, and always answers
//! with an `attachment` disposition so browsers save the file instead of
//! opening it in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StitchError};
use crate::ids::{BlobId, SessionId};
use crate::session::Session;
use crate::store::BlobStore;

/// MIME type of every download.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const ROUTE_PREFIX: &str = "/download/";

/// Address of a merge output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub session_id: SessionId,
    pub blob_id: BlobId,
}

impl DownloadLink {
    pub fn new(session_id: SessionId, blob_id: BlobId) -> Self {
        Self {
            session_id,
            blob_id,
        }
    }

    /// Parse a download URL.
    ///
    /// Accepts an absolute URL or a bare path; a query string is ignored.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `url` is not a download route.
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || StitchError::validation(format!("not a download link: {url}"));

        let path = url.split(['?', '#']).next().unwrap_or_default();
        let start = path.find(ROUTE_PREFIX).ok_or_else(invalid)?;
        let rest = &path[start + ROUTE_PREFIX.len()..];

        let mut segments = rest.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(session), Some(blob), None) if !session.is_empty() && !blob.is_empty() => {
                Ok(Self::new(SessionId::from(session), BlobId::from(blob)))
            }
            _ => Err(invalid()),
        }
    }

    /// Route path of this link.
    pub fn url(&self) -> String {
        format!("{ROUTE_PREFIX}{}/{}", self.session_id, self.blob_id)
    }
}

impl fmt::Display for DownloadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

impl FromStr for DownloadLink {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A materialized download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub content_disposition: String,
    pub bytes: Vec<u8>,
}

/// Materialize the output behind `link` for `requester`.
///
/// Checks run in order: the link must belong to the requester
/// (authorization error otherwise), the requester must have produced the
/// output (not found), and the blob must still exist (not found). The
/// output is not consumed.
pub async fn present(
    requester: &Session,
    link: &DownloadLink,
    requested_name: Option<&str>,
) -> Result<Download> {
    if &link.session_id != requester.id() {
        tracing::warn!(
            session_id = %requester.id(),
            owner = %link.session_id,
            blob_id = %link.blob_id,
            "Refused download owned by another session"
        );
        return Err(StitchError::unauthorized(
            "download belongs to another session",
        ));
    }

    let output = requester
        .output(&link.blob_id)
        .ok_or_else(|| StitchError::not_found(format!("merged output {}", link.blob_id)))?;

    let bytes = requester
        .store()
        .get(&output.blob_id)
        .await?
        .ok_or_else(|| StitchError::not_found(format!("merged output {}", link.blob_id)))?;

    let file_name = match requested_name {
        Some(name) => sanitize_file_name(name, &output.file_name),
        None => output.file_name.clone(),
    };
    requester.touch();

    tracing::info!(
        session_id = %requester.id(),
        blob_id = %output.blob_id,
        file_name = %file_name,
        size = bytes.len(),
        "Serving download"
    );

    Ok(Download {
        content_disposition: content_disposition(&file_name),
        file_name,
        content_type: PDF_CONTENT_TYPE,
        bytes,
    })
}

/// Clean a caller-supplied file name.
///
/// Path separators, quotes and control characters are dropped and `.pdf`
/// is appended when missing. Falls back to `fallback` if nothing is left.
pub fn sanitize_file_name(requested: &str, fallback: &str) -> String {
    let cleaned: String = requested
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '"') && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.is_empty() {
        return fallback.to_string();
    }
    if cleaned.to_ascii_lowercase().ends_with(".pdf") {
        cleaned.to_string()
    } else {
        format!("{cleaned}.pdf")
    }
}

/// `Content-Disposition` value forcing a download of `file_name`.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MergedOutput;
    use crate::store::MemoryBlobStore;
    use rstest::rstest;
    use std::sync::Arc;

    async fn session_with_output(store: &MemoryBlobStore) -> (Session, DownloadLink) {
        let session = Session::new(SessionId::generate(), Arc::new(store.clone()));
        let blob_id = store.put(b"%PDF-merged".to_vec()).await.unwrap();
        session.record_output(MergedOutput {
            blob_id: blob_id.clone(),
            file_name: "merged-1700000000000.pdf".to_string(),
            page_count: 1,
            byte_size: 11,
        });
        let link = DownloadLink::new(session.id().clone(), blob_id);
        (session, link)
    }

    #[test]
    fn test_link_renders_and_parses() {
        let link = DownloadLink::new(SessionId::from("s1"), BlobId::from("b1"));
        assert_eq!(link.url(), "/download/s1/b1");
        assert_eq!(DownloadLink::parse("/download/s1/b1").unwrap(), link);
        assert_eq!(
            DownloadLink::parse("http://localhost:3000/download/s1/b1?name=x").unwrap(),
            link
        );
        assert_eq!("/download/s1/b1".parse::<DownloadLink>().unwrap(), link);
    }

    #[rstest]
    #[case("/upload/s1/b1")]
    #[case("/download/s1")]
    #[case("/download/s1/b1/extra")]
    #[case("/download//b1")]
    fn test_link_rejects_other_paths(#[case] url: &str) {
        let err = DownloadLink::parse(url).unwrap_err();
        assert!(matches!(err, StitchError::Validation { .. }));
    }

    #[rstest]
    #[case("report", "report.pdf")]
    #[case("report.PDF", "report.PDF")]
    #[case("../../etc/passwd", "etcpasswd.pdf")]
    #[case("a\"b\nc", "abc.pdf")]
    #[case("   ", "fallback.pdf")]
    #[case("季度报表", "季度报表.pdf")]
    fn test_sanitize_file_name(#[case] requested: &str, #[case] expected: &str) {
        assert_eq!(sanitize_file_name(requested, "fallback.pdf"), expected);
    }

    #[test]
    fn test_content_disposition_forces_attachment() {
        let value = content_disposition("报表 1.pdf");
        assert!(value.starts_with("attachment; "));
        assert!(value.contains("filename=\"__ 1.pdf\""));
        assert!(value.contains("filename*=UTF-8''%E6%8A%A5%E8%A1%A8%201.pdf"));
    }

    #[tokio::test]
    async fn test_present_owned_output() {
        let store = MemoryBlobStore::new();
        let (session, link) = session_with_output(&store).await;

        let download = present(&session, &link, Some("combined")).await.unwrap();
        assert_eq!(download.file_name, "combined.pdf");
        assert_eq!(download.content_type, "application/pdf");
        assert_eq!(download.bytes, b"%PDF-merged");

        // Not consumed.
        let again = present(&session, &link, None).await.unwrap();
        assert_eq!(again.file_name, "merged-1700000000000.pdf");
    }

    #[tokio::test]
    async fn test_present_other_session_is_unauthorized() {
        let store = MemoryBlobStore::new();
        let (_owner, link) = session_with_output(&store).await;
        let intruder = Session::new(SessionId::generate(), Arc::new(store.clone()));

        let err = present(&intruder, &link, None).await.unwrap_err();
        assert!(matches!(err, StitchError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_present_unknown_output_is_not_found() {
        let store = MemoryBlobStore::new();
        let (session, _) = session_with_output(&store).await;
        let link = DownloadLink::new(session.id().clone(), BlobId::generate());

        let err = present(&session, &link, None).await.unwrap_err();
        assert!(matches!(err, StitchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_present_after_clear_is_not_found() {
        let store = MemoryBlobStore::new();
        let (session, link) = session_with_output(&store).await;
        session.clear().await;

        let err = present(&session, &link, None).await.unwrap_err();
        assert!(matches!(err, StitchError::NotFound { .. }));
    }
}
