//! Stash-related request schema
//!

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of a stash creation request, the owner is the calling user.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewStash {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
