//! [`PdfCodec`] implementation on top of `lopdf`.
//!
//! Pages are copied object by object: the page dictionary and everything
//! reachable from it is cloned into the output under fresh object ids.
//! Each output remembers which source objects it already imported, so a
//! font or image shared by many pages of one source is copied once.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::PdfCodec;
use crate::error::{Result, StitchError};
use crate::rotation::Rotation;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// A parsed source document.
#[derive(Debug)]
pub struct LopdfSource {
    /// Distinguishes sources inside an output's import table.
    token: u64,
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
}

impl LopdfSource {
    /// The underlying document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// An output document under construction.
#[derive(Debug)]
pub struct LopdfOutput {
    document: Document,
    /// Reserved id of the page tree root, written at serialization.
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// (source token, source object id) -> output object id.
    imported: HashMap<(u64, ObjectId), ObjectId>,
}

impl LopdfOutput {
    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    fn import_object(&mut self, source: &LopdfSource, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.import_reference(source, *id),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import_object(source, item))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(source, dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.import_dictionary(source, &stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn import_dictionary(&mut self, source: &LopdfSource, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            let value = self.import_object(source, value);
            copied.set(key.clone(), value);
        }
        copied
    }

    fn import_reference(&mut self, source: &LopdfSource, id: ObjectId) -> Object {
        if let Some(&mapped) = self.imported.get(&(source.token, id)) {
            return Object::Reference(mapped);
        }

        let Ok(object) = source.document.get_object(id) else {
            return Object::Null;
        };

        // Other pages and tree nodes are never pulled in through a reference
        // (annotation /P, struct parents and the like).
        if is_page_tree_node(object) {
            return Object::Null;
        }

        let new_id = self.document.new_object_id();
        self.imported.insert((source.token, id), new_id);
        let copied = self.import_object(source, object);
        self.document.objects.insert(new_id, copied);
        Object::Reference(new_id)
    }
}

/// `lopdf`-backed codec.
#[derive(Debug, Default)]
pub struct LopdfCodec {
    next_token: AtomicU64,
}

impl LopdfCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PdfCodec for LopdfCodec {
    type Source = LopdfSource;
    type Output = LopdfOutput;
    type Page = ObjectId;

    fn open(&self, bytes: &[u8]) -> Result<LopdfSource> {
        let document = Document::load_mem(bytes).map_err(|err| {
            let err_msg = err.to_string();
            if err_msg.contains("encrypt") || err_msg.contains("password") {
                StitchError::codec(format!(
                    "PDF is encrypted and cannot be processed: {err_msg}"
                ))
            } else {
                StitchError::codec(format!("Failed to parse PDF: {err_msg}"))
            }
        })?;

        let page_ids = document.get_pages().into_values().collect();

        Ok(LopdfSource {
            token: self.next_token.fetch_add(1, Ordering::Relaxed),
            document,
            page_ids,
        })
    }

    fn page_count(&self, source: &LopdfSource) -> usize {
        source.page_ids.len()
    }

    fn create_output(&self) -> LopdfOutput {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        LopdfOutput {
            document,
            pages_id,
            kids: Vec::new(),
            imported: HashMap::new(),
        }
    }

    fn copy_page(
        &self,
        output: &mut LopdfOutput,
        source: &LopdfSource,
        page_index: usize,
    ) -> Result<ObjectId> {
        let page_id = *source.page_ids.get(page_index).ok_or_else(|| {
            StitchError::codec(format!(
                "Page index {page_index} out of range ({} pages)",
                source.page_ids.len()
            ))
        })?;
        let page = source.document.get_dictionary(page_id)?;

        let mut copied = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            let value = output.import_object(source, value);
            copied.set(key.clone(), value);
        }

        // The copy gets a new parent, so inherited attributes must move
        // onto the page itself.
        for key in INHERITABLE_KEYS {
            if copied.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(&source.document, page, key) {
                let value = output.import_object(source, value);
                copied.set(key, value);
            }
        }
        copied.set("Type", Object::Name(b"Page".to_vec()));

        Ok(output.document.add_object(copied))
    }

    fn set_rotation(
        &self,
        output: &mut LopdfOutput,
        page: ObjectId,
        rotation: Rotation,
    ) -> Result<()> {
        let dict = output.document.get_object_mut(page)?.as_dict_mut()?;
        dict.set("Rotate", Object::Integer(rotation.as_degrees()));
        Ok(())
    }

    fn append_page(&self, output: &mut LopdfOutput, page: ObjectId) -> Result<()> {
        let pages_id = output.pages_id;
        let dict = output.document.get_object_mut(page)?.as_dict_mut()?;
        dict.set("Parent", Object::Reference(pages_id));
        output.kids.push(page);
        Ok(())
    }

    fn serialize(&self, output: LopdfOutput) -> Result<Vec<u8>> {
        let LopdfOutput {
            mut document,
            pages_id,
            kids,
            ..
        } = output;

        let count = kids.len() as i64;
        let kids: Vec<Object> = kids.into_iter().map(Object::Reference).collect();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        document.compress();

        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .map_err(|err| StitchError::codec(format!("Failed to write merged PDF: {err}")))?;

        Ok(buffer)
    }
}

fn is_page_tree_node(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => {
            matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Page" || name == b"Pages")
        }
        _ => false,
    }
}

/// Walk up the `Parent` chain looking for `key`.
fn inherited_attribute<'a>(
    document: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        depth += 1;

        let node = document.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}
