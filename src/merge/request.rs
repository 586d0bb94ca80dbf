//! Merge requests: the transport body and its validated form.

use serde::{Deserialize, Serialize};

use super::ConcurrencyClass;
use crate::error::{Result, StitchError};
use crate::ids::FileId;
use crate::rotation::Rotation;

/// Merge request as sent by a client.
///
/// ```json
/// { "fileIds": ["..."], "pageItems": [{ "fileId": "...", "page": 1, "rotation": 90 }] }
/// ```
///
/// `filename` and `rotate` are accepted as aliases inside page items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequestBody {
    #[serde(default)]
    pub file_ids: Vec<FileId>,
    #[serde(default)]
    pub page_items: Vec<PageItemBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageItemBody {
    #[serde(alias = "filename")]
    pub file_id: FileId,
    /// 1-based page number. Out-of-range values are clamped at resolution.
    pub page: i64,
    #[serde(default, alias = "rotate")]
    pub rotation: i64,
}

/// One explicitly chosen page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    pub file_id: FileId,
    pub page: i64,
    pub rotation: Rotation,
}

impl PageItem {
    pub fn new(file_id: FileId, page: i64, rotation: Rotation) -> Self {
        Self {
            file_id,
            page,
            rotation,
        }
    }
}

/// A validated merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeRequest {
    /// Exact pages in output order, rotations taken as given.
    Pages(Vec<PageItem>),
    /// Every surviving page of each file, files in the given order.
    Files(Vec<FileId>),
}

impl MergeRequest {
    /// Class a request runs under when page-level merges stay inline.
    pub fn default_class(&self) -> ConcurrencyClass {
        match self {
            Self::Pages(_) => ConcurrencyClass::Inline,
            Self::Files(_) => ConcurrencyClass::Bounded,
        }
    }

    /// Number of items in the request.
    pub fn len(&self) -> usize {
        match self {
            Self::Pages(items) => items.len(),
            Self::Files(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pages(_) => "pages",
            Self::Files(_) => "files",
        }
    }
}

impl TryFrom<MergeRequestBody> for MergeRequest {
    type Error = StitchError;

    /// Page items win over file ids; a body with neither is rejected.
    fn try_from(body: MergeRequestBody) -> Result<Self> {
        if !body.page_items.is_empty() {
            let items = body
                .page_items
                .into_iter()
                .map(|item| {
                    Ok(PageItem {
                        rotation: Rotation::from_degrees(item.rotation)?,
                        file_id: item.file_id,
                        page: item.page,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::Pages(items));
        }

        if !body.file_ids.is_empty() {
            return Ok(Self::Files(body.file_ids));
        }

        Err(StitchError::validation("select at least one file"))
    }
}
