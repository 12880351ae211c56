use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use stashes_shared::content::ContentType;
use stashes_shared::StringVec;
use utoipa::ToSchema;

/// A stored file. `content` always mirrors the newest row in `file_version`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "file")]
#[schema(as = StashFile)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stash_id: Uuid,
    pub name: String,
    pub path: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub content_type: ContentType,
    #[sea_orm(column_type = "Json")]
    pub tags: StringVec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stash::Entity",
        from = "Column::StashId",
        to = "super::stash::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Stash,
    #[sea_orm(has_many = "super::file_version::Entity")]
    Versions,
}

impl Related<super::stash::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stash.def()
    }
}

impl Related<super::file_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
