use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    /// Organization display name burned into watermark stamps.
    pub organization: Option<String>,
    pub email: String,
    /// One of: playwright, theater, admin.
    pub role: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::script::Entity")]
    Scripts,
    #[sea_orm(has_many = "super::license::Entity")]
    Licenses,
    #[sea_orm(has_many = "super::perusal_request::Entity")]
    PerusalRequests,
}

impl Related<super::script::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scripts.def()
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
