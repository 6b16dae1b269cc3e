use common::LicenseStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "license")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub script_id: i32,
    /// The licensee (theater company) user.
    pub theater_id: i32,
    /// Commercial license class, e.g. "standard" or "educational".
    pub license_type: String,
    pub status: LicenseStatus,
    /// Performance rights end here; downloads stop as soon as this elapses.
    pub expires_at: Option<DateTimeUtc>,
    /// JSON array of `{date, venue}` entries burned into the watermark.
    #[sea_orm(column_type = "JsonBinary")]
    pub performance_dates: Json,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::script::Entity",
        from = "Column::ScriptId",
        to = "super::script::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Script,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TheaterId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Theater,
}

impl Related<super::script::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Script.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Theater.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
