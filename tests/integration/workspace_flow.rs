//! End-to-end flows through the service surface.

use std::sync::Arc;

use pdfstitch::config::{Config, StorageBackend};
use pdfstitch::merge::{MergeRequestBody, PageItemBody};
use pdfstitch::service::{PageRef, Workspace};
use pdfstitch::{SessionId, StitchError};

use crate::common::{memory_workspace, page_rotations, page_texts, upload};

#[tokio::test]
async fn test_whole_file_merge_applies_page_state() {
    let (ws, _store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let a = upload(&ws, &session, "a.pdf", 3).await;
    let b = upload(&ws, &session, "b.pdf", 2).await;

    ws.delete_pages(
        &session,
        &[PageRef {
            file_id: a.id.clone(),
            page: 1,
        }],
    )
    .unwrap();
    ws.rotate_page(&session, &b.id, 2, 90).unwrap();

    let merged = ws
        .merge(
            Arc::clone(&session),
            MergeRequestBody {
                file_ids: vec![b.id.clone(), a.id.clone()],
                page_items: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(merged.pages, 4);

    let download = ws
        .download(&session, &merged.download_url, None)
        .await
        .unwrap();
    assert_eq!(download.file_name, merged.filename);
    assert_eq!(download.content_type, "application/pdf");
    assert!(download.content_disposition.starts_with("attachment;"));

    let texts = page_texts(&download.bytes);
    let order: Vec<_> = ["b.pdf page 1", "b.pdf page 2", "a.pdf page 2", "a.pdf page 3"]
        .iter()
        .zip(&texts)
        .map(|(expected, text)| text.contains(expected))
        .collect();
    assert_eq!(order, vec![true; 4]);
    assert_eq!(page_rotations(&download.bytes), vec![0, 90, 0, 0]);
}

#[tokio::test]
async fn test_page_level_merge_can_repeat_pages() {
    let (ws, _store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let a = upload(&ws, &session, "a.pdf", 2).await;

    let item = |page, rotation| PageItemBody {
        file_id: a.id.clone(),
        page,
        rotation,
    };
    let merged = ws
        .merge(
            Arc::clone(&session),
            MergeRequestBody {
                file_ids: vec![a.id.clone()],
                page_items: vec![item(2, 0), item(2, 180), item(99, 0)],
            },
        )
        .await
        .unwrap();
    assert_eq!(merged.pages, 3);

    let download = ws
        .download(&session, &merged.download_url, Some("picked.pdf"))
        .await
        .unwrap();
    let texts = page_texts(&download.bytes);
    // Out-of-range pages clamp to the last page.
    assert!(texts.iter().all(|text| text.contains("a.pdf page 2")));
    assert_eq!(page_rotations(&download.bytes), vec![0, 180, 0]);
    assert!(
        download
            .content_disposition
            .contains("filename=\"picked.pdf\"")
    );
}

#[tokio::test]
async fn test_downloads_are_repeatable_until_clear() {
    let (ws, store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let a = upload(&ws, &session, "a.pdf", 1).await;
    let merged = ws
        .merge(
            Arc::clone(&session),
            MergeRequestBody {
                file_ids: vec![a.id],
                page_items: vec![],
            },
        )
        .await
        .unwrap();

    for _ in 0..2 {
        assert!(ws.download(&session, &merged.download_url, None).await.is_ok());
    }
    assert_eq!(store.len().await, 2);

    ws.clear(&session).await;
    assert_eq!(store.len().await, 0);
    let err = ws
        .download(&session, &merged.download_url, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StitchError::NotFound { .. }));
}

#[tokio::test]
async fn test_filesystem_store_is_cleaned_on_session_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = Config {
        storage: StorageBackend::Filesystem(dir.path().to_path_buf()),
        ..Config::default()
    };
    let ws = Workspace::open(config).await.unwrap();
    let session = ws.session(None);
    let a = upload(&ws, &session, "a.pdf", 2).await;
    ws.merge(
        Arc::clone(&session),
        MergeRequestBody {
            file_ids: vec![a.id],
            page_items: vec![],
        },
    )
    .await
    .unwrap();

    let blobs = || std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(blobs(), 2);

    assert!(ws.end_session(session.id()).await);
    assert_eq!(blobs(), 0);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (ws, _store) = memory_workspace(Config::default());
    let first = ws.session(None);
    let second = ws.session(None);
    let a = upload(&ws, &first, "a.pdf", 1).await;

    assert!(ws.files(&second).is_empty());
    let err = ws
        .merge(
            Arc::clone(&second),
            MergeRequestBody {
                file_ids: vec![a.id],
                page_items: vec![],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid request: nothing to merge");

    // Resuming by id returns the same session.
    let again = ws.session(Some(first.id()));
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(ws.files(&again).len(), 1);

    let unknown = ws.session(Some(&SessionId::from("gone")));
    assert_ne!(unknown.id(), first.id());
}
