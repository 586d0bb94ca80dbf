//! Behavioral guarantees of resolution and scheduling.

use std::sync::Arc;
use std::time::Duration;

use pdfstitch::codec::LopdfCodec;
use pdfstitch::config::Config;
use pdfstitch::merge::{MergeRequest, MergeResolver, PageItem, ResolvedPage};
use pdfstitch::store::BlobStore;
use pdfstitch::{ConcurrencyClass, FileId, Rotation, Session, StitchError};

use crate::common::{build_pdf, memory_workspace, page_texts, upload};

async fn resolve(session: &Session, request: MergeRequest) -> pdfstitch::Result<Vec<ResolvedPage>> {
    let resolver = MergeResolver::new(Arc::new(LopdfCodec::new()));
    let resolution = resolver.resolve(session, &request).await?;
    Ok(resolution.into_job(session.id().clone())?.pages)
}

fn summary(pages: &[ResolvedPage]) -> Vec<(usize, i64)> {
    pages
        .iter()
        .map(|page| (page.page_index, page.rotation.as_degrees()))
        .collect()
}

#[tokio::test]
async fn test_fresh_file_resolves_every_page_in_order() {
    let (ws, _store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let file = upload(&ws, &session, "five.pdf", 5).await;

    let pages = resolve(&session, MergeRequest::Files(vec![file.id])).await.unwrap();
    assert_eq!(
        summary(&pages),
        vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]
    );
}

#[tokio::test]
async fn test_deleting_twice_equals_deleting_once() {
    let (ws, _store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let file = upload(&ws, &session, "f.pdf", 4).await;

    assert!(session.delete_page(&file.id, 3).unwrap());
    assert!(!session.delete_page(&file.id, 3).unwrap());

    let pages = resolve(&session, MergeRequest::Files(vec![file.id])).await.unwrap();
    assert_eq!(summary(&pages), vec![(0, 0), (1, 0), (3, 0)]);
}

#[tokio::test]
async fn test_rotation_overwrites() {
    let (ws, _store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let file = upload(&ws, &session, "f.pdf", 2).await;

    ws.rotate_page(&session, &file.id, 2, 90).unwrap();
    ws.rotate_page(&session, &file.id, 2, 180).unwrap();

    let pages = resolve(&session, MergeRequest::Files(vec![file.id])).await.unwrap();
    assert_eq!(summary(&pages), vec![(0, 0), (1, 180)]);
}

#[tokio::test]
async fn test_unknown_ids_are_skipped_in_order() {
    let (ws, _store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let a = upload(&ws, &session, "a.pdf", 2).await;
    let b = upload(&ws, &session, "b.pdf", 2).await;

    let request = MergeRequest::Pages(vec![
        PageItem::new(b.id.clone(), 2, Rotation::Clockwise90),
        PageItem::new(FileId::from("missing"), 1, Rotation::None),
        PageItem::new(a.id.clone(), 1, Rotation::None),
    ]);
    let pages = resolve(&session, request).await.unwrap();

    let files: Vec<_> = pages.iter().map(|page| page.file.id.clone()).collect();
    assert_eq!(files, vec![b.id, a.id]);
    assert_eq!(summary(&pages), vec![(1, 90), (0, 0)]);
}

#[tokio::test]
async fn test_nothing_resolvable_is_rejected_before_execution() {
    let (ws, store) = memory_workspace(Config::default());
    let session = ws.session(None);

    let err = resolve(&session, MergeRequest::Files(vec![FileId::from("nope")]))
        .await
        .unwrap_err();
    assert!(matches!(err, StitchError::Validation { .. }));

    let err = ws
        .engine()
        .merge(
            Arc::clone(&session),
            MergeRequest::Files(vec![FileId::from("nope")]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(store.len().await, 0);
    assert!(session.outputs().is_empty());
}

#[tokio::test]
async fn test_removed_file_behaves_like_unknown() {
    let (ws, _store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let a = upload(&ws, &session, "a.pdf", 1).await;
    let b = upload(&ws, &session, "b.pdf", 2).await;

    ws.delete_files(&session, std::slice::from_ref(&a.id))
        .await
        .unwrap();
    // Page actions on the removed file are no-ops.
    assert!(!session.delete_page(&a.id, 1).unwrap());

    let pages = resolve(&session, MergeRequest::Files(vec![a.id.clone(), b.id.clone()]))
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|page| page.file.id == b.id));
}

#[tokio::test]
async fn test_round_trip_keeps_page_content() {
    let (ws, store) = memory_workspace(Config::default());
    let session = ws.session(None);
    let file = upload(&ws, &session, "orig.pdf", 3).await;

    let output = ws
        .engine()
        .merge(Arc::clone(&session), MergeRequest::Files(vec![file.id]))
        .await
        .unwrap();
    assert_eq!(output.class, ConcurrencyClass::Bounded);

    let merged = store.get(&output.blob_id).await.unwrap().unwrap();
    let source = build_pdf(3, "orig.pdf");
    assert_eq!(page_texts(&merged), page_texts(&source));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_slot_pool_drains_every_job() {
    let (ws, _store) = memory_workspace(Config {
        pool_capacity: 1,
        ..Config::default()
    });
    let session = ws.session(None);
    let file = upload(&ws, &session, "f.pdf", 20).await;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            ws.engine()
                .submit(Arc::clone(&session), MergeRequest::Files(vec![file.id.clone()]))
        })
        .collect();

    for handle in handles {
        let output = handle.wait_timeout(Duration::from_secs(30)).await.unwrap();
        assert_eq!(output.page_count, 20);
    }
    assert_eq!(ws.engine().pool().running(), 0);
    assert_eq!(ws.engine().pool().waiting(), 0);
    assert_eq!(session.outputs().len(), 4);
}
