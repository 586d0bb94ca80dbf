//! pdfstitch - session-scoped PDF page assembly.
//!
//! Clients upload PDFs into an ephemeral session, delete or rotate
//! individual pages, and merge either whole files or an explicit page list
//! into a new document they can download under a name of their choice.
//!
//! - [`session`]: per-client file registry, page state and lifecycle
//! - [`merge`]: request validation, resolution, scheduling and assembly
//! - [`codec`]: the PDF operations merges need, implemented with `lopdf`
//! - [`store`]: blob storage in memory or on disk
//! - [`download`]: ownership-checked, named downloads of merge outputs
//! - [`service`]: the transport-shaped surface tying it all together
//!
//! # Examples
//!
//! ```no_run
//! use pdfstitch::config::Config;
//! use pdfstitch::merge::MergeRequestBody;
//! use pdfstitch::service::{Upload, Workspace};
//!
//! # async fn example() -> pdfstitch::Result<()> {
//! let workspace = Workspace::open(Config::from_env()?).await?;
//! let session = workspace.session(None);
//!
//! let bytes = std::fs::read("scan.pdf")?;
//! let files = workspace
//!     .upload(&session, vec![Upload::new("scan.pdf", bytes)])
//!     .await?
//!     .files;
//! workspace.rotate_page(&session, &files[0].id, 1, 90)?;
//!
//! let merged = workspace
//!     .merge(
//!         session.clone(),
//!         MergeRequestBody {
//!             file_ids: files.iter().map(|f| f.id.clone()).collect(),
//!             page_items: Vec::new(),
//!         },
//!     )
//!     .await?;
//! let download = workspace
//!     .download(&session, &merged.download_url, Some("rotated"))
//!     .await?;
//! std::fs::write(&download.file_name, &download.bytes)?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod download;
pub mod error;
pub mod ids;
pub mod merge;
pub mod output;
pub mod rotation;
pub mod service;
pub mod session;
pub mod store;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{ErrorKind, Result, StitchError};
pub use ids::{BlobId, FileId, SessionId};
pub use merge::{ConcurrencyClass, MergeEngine, MergeRequest, MergeRequestBody};
pub use rotation::Rotation;
pub use service::Workspace;
pub use session::{Session, SessionManager, SourceFile};
