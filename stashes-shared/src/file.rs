//! File-related request schema
//!

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::content::ContentType;
use crate::error::StashError;
use crate::StringVec;

fn default_path() -> String {
    "/".to_string()
}

/// Body of a file creation request.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewFile {
    pub name: String,
    /// Logical folder path inside the stash
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub tags: StringVec,
}

impl NewFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: default_path(),
            content: content.into(),
            content_type: ContentType::default(),
            tags: StringVec::default(),
        }
    }

    pub fn validate(&self) -> Result<(), StashError> {
        if self.name.trim().is_empty() {
            return Err(StashError::ValidationError(
                "file name cannot be empty".to_string(),
            ));
        }
        self.content_type.check(&self.content)
    }
}

/// A partial update to a file. Only `content` is versioned, the other fields
/// are applied to the file row as-is.
#[derive(Debug, Serialize, Deserialize, Clone, Default, ToSchema)]
pub struct FileChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<StringVec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileChanges {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Body of a revert request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, ToSchema)]
pub struct RevertRequest {
    /// Version number whose content becomes current again
    pub version: i32,
}
