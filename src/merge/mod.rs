//! Merge pipeline.
//!
//! A merge goes through three stages:
//!
//! 1. [`MergeRequest`]: the client body is validated (shape, rotations)
//!    before any I/O.
//! 2. [`MergeResolver`]: the request is resolved tolerantly against the
//!    session into an ordered page list. Stale file ids are skipped.
//!    [`Resolution::into_job`] then rejects an empty result.
//! 3. [`MergeExecutor`]: pages are copied into a fresh document, which is
//!    stored as one new blob.
//!
//! [`MergeEngine`] drives the stages and applies the concurrency policy:
//! [`ConcurrencyClass::Bounded`] jobs queue for a [`MergePool`] permit,
//! [`ConcurrencyClass::Inline`] jobs run in the caller's task.

pub mod engine;
pub mod executor;
pub mod pool;
pub mod request;
pub mod resolver;

pub use engine::{MergeEngine, MergeHandle, MergePlan};
pub use executor::{MergeExecutor, MergeOutput};
pub use pool::{MergePool, PoolPermit};
pub use request::{MergeRequest, MergeRequestBody, PageItem, PageItemBody};
pub use resolver::{MergeJob, MergeResolver, Resolution, SourceCache};

use serde::Serialize;
use std::fmt;

use crate::rotation::Rotation;
use crate::session::SourceFile;

/// How a merge job is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyClass {
    /// Waits for a pool permit.
    Bounded,
    /// Runs in the requesting task, outside the pool.
    Inline,
}

impl fmt::Display for ConcurrencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded => f.write_str("bounded"),
            Self::Inline => f.write_str("inline"),
        }
    }
}

/// One page of a merge output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPage {
    pub file: SourceFile,
    /// Zero-based index into the source document.
    pub page_index: usize,
    pub rotation: Rotation,
}
