//! Helpers shared by the integration tests.
//!
//! PDFs are generated on the fly with `lopdf` instead of checked-in
//! fixtures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{Document, Object, Stream, dictionary};
use pdfstitch::codec::LopdfCodec;
use pdfstitch::config::Config;
use pdfstitch::service::{Upload, Workspace};
use pdfstitch::store::{BlobStore, MemoryBlobStore};
use pdfstitch::{Session, SourceFile};

/// A PDF with `pages` pages, each drawing `"<label> page <n>"`.
pub fn build_pdf(pages: u32, label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let kids: Vec<Object> = (1..=pages)
        .map(|n| {
            let content = format!("BT /F1 10 Tf 50 700 Td ({label} page {n}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            });
            page_id.into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize test PDF");
    bytes
}

/// Write a generated PDF to `dir/name`.
pub fn write_pdf(dir: &Path, name: &str, pages: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_pdf(pages, name)).expect("write test PDF");
    path
}

pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("parse output");
    doc.get_pages()
        .into_values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
        .collect()
}

pub fn page_rotations(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).expect("parse output");
    doc.get_pages()
        .into_values()
        .map(|id| {
            doc.get_dictionary(id)
                .unwrap()
                .get(b"Rotate")
                .and_then(|r| r.as_i64())
                .unwrap_or(0)
        })
        .collect()
}

/// A workspace on a fresh memory store, returned with the store.
pub fn memory_workspace(config: Config) -> (Workspace, MemoryBlobStore) {
    let store = MemoryBlobStore::new();
    let shared: Arc<dyn BlobStore> = Arc::new(store.clone());
    (
        Workspace::with_codec(config, shared, LopdfCodec::new()),
        store,
    )
}

/// Upload one generated PDF and return its registration.
pub async fn upload(workspace: &Workspace, session: &Session, name: &str, pages: u32) -> SourceFile {
    let mut files = workspace
        .upload(session, vec![Upload::new(name, build_pdf(pages, name))])
        .await
        .expect("upload");
    files.files.pop().expect("upload accepted")
}
