//! Content type discriminator for stored files
//!

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::StashError;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    #[sea_orm(string_value = "markdown")]
    Markdown,
    #[sea_orm(string_value = "json")]
    Json,
    #[sea_orm(string_value = "jsonl")]
    Jsonl,
}

impl ContentType {
    /// Checks the content is well-formed for this type. Markdown accepts anything.
    pub fn check(&self, content: &str) -> Result<(), StashError> {
        match self {
            ContentType::Markdown => Ok(()),
            ContentType::Json => {
                serde_json::from_str::<serde_json::Value>(content).map_err(|err| {
                    StashError::ValidationError(format!("content is not valid JSON: {err}"))
                })?;
                Ok(())
            }
            ContentType::Jsonl => {
                for (lineno, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    serde_json::from_str::<serde_json::Value>(line).map_err(|err| {
                        StashError::ValidationError(format!(
                            "line {} is not valid JSON: {err}",
                            lineno + 1
                        ))
                    })?;
                }
                Ok(())
            }
        }
    }
}
