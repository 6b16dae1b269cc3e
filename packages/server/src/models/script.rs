use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::script;

/// Request DTO for creating a script.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateScriptRequest {
    #[schema(example = "A Doll's House")]
    pub title: String,
    pub synopsis: Option<String>,
}

/// Response DTO for script metadata. Storage references are never exposed.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ScriptResponse {
    pub id: i32,
    pub title: String,
    pub synopsis: Option<String>,
    pub playwright_id: i32,
    /// Whether a manuscript has been uploaded.
    pub has_file: bool,
    /// Whether a perusal derivative is available.
    pub has_perusal: bool,
    pub page_count: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<script::Model> for ScriptResponse {
    fn from(model: script::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            synopsis: model.synopsis,
            playwright_id: model.playwright_id,
            has_file: model.file_ref.is_some(),
            has_perusal: model.perusal_ref.is_some(),
            page_count: model.page_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Response DTO for a completed manuscript upload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ScriptFileResponse {
    pub script_id: i32,
    pub page_count: i32,
    /// SHA-256 of the stored manuscript.
    pub sha256: String,
    /// Upload size in bytes.
    pub size: u64,
}
