//! PDF codec seam.
//!
//! The merge executor only needs a handful of document operations: parse
//! a source, count its pages, copy one page into an output, set that
//! page's rotation, append it, and serialize the output. [`PdfCodec`]
//! names exactly those so the assembly logic does not depend on a
//! particular PDF library. [`LopdfCodec`] is the implementation used in
//! production.

pub mod document;

pub use document::{LopdfCodec, LopdfOutput, LopdfSource};

use crate::error::Result;
use crate::rotation::Rotation;

/// Operations the merge engine needs from a PDF library.
///
/// All methods are synchronous and may be CPU heavy; the engine calls
/// them from Tokio's blocking pool.
pub trait PdfCodec: Send + Sync + 'static {
    /// A parsed source document.
    type Source: Send + Sync + 'static;

    /// An output document under construction.
    type Output: Send + 'static;

    /// Handle to a page copied into an output.
    type Page: Copy + Send + 'static;

    /// Parse a source document.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the bytes are not a readable PDF.
    fn open(&self, bytes: &[u8]) -> Result<Self::Source>;

    /// Number of pages in a source document.
    fn page_count(&self, source: &Self::Source) -> usize;

    /// Start an empty output document.
    fn create_output(&self) -> Self::Output;

    /// Copy the page at zero-based `page_index` of `source` into `output`.
    ///
    /// The copy is not part of the output's page sequence until
    /// [`PdfCodec::append_page`] is called.
    fn copy_page(
        &self,
        output: &mut Self::Output,
        source: &Self::Source,
        page_index: usize,
    ) -> Result<Self::Page>;

    /// Set a copied page's rotation, replacing whatever it had.
    fn set_rotation(
        &self,
        output: &mut Self::Output,
        page: Self::Page,
        rotation: Rotation,
    ) -> Result<()>;

    /// Append a copied page to the end of the output's page sequence.
    fn append_page(&self, output: &mut Self::Output, page: Self::Page) -> Result<()>;

    /// Serialize the finished output.
    fn serialize(&self, output: Self::Output) -> Result<Vec<u8>>;
}
