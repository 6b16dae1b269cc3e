use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "script")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub synopsis: Option<String>,
    pub playwright_id: i32,

    /// `{bucket}/{key}` reference to the full manuscript.
    /// NULL until a file has been uploaded.
    pub file_ref: Option<String>,
    /// `{bucket}/{key}` reference to the page-limited perusal derivative.
    /// Set together with `file_ref` at upload time.
    pub perusal_ref: Option<String>,
    /// SHA-256 of the uploaded manuscript, for provenance.
    pub file_sha256: Option<String>,
    pub page_count: Option<i32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::PlaywrightId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Playwright,
    #[sea_orm(has_many = "super::license::Entity")]
    Licenses,
    #[sea_orm(has_many = "super::perusal_request::Entity")]
    PerusalRequests,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Playwright.def()
    }
}

impl Related<super::license::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Licenses.def()
    }
}

impl Related<super::perusal_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PerusalRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
