use chrono::{DateTime, Utc};
use common::PerusalRequestStatus;
use serde::Serialize;

use crate::entity::perusal_request;

/// Response DTO for a perusal request.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PerusalRequestResponse {
    /// Request ID (UUIDv7).
    pub id: String,
    pub script_id: i32,
    pub requester_id: i32,
    pub status: PerusalRequestStatus,
    pub expires_at: DateTime<Utc>,
    pub download_count: i32,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<perusal_request::Model> for PerusalRequestResponse {
    fn from(model: perusal_request::Model) -> Self {
        Self {
            id: model.id.to_string(),
            script_id: model.script_id,
            requester_id: model.requester_id,
            status: model.status,
            expires_at: model.expires_at,
            download_count: model.download_count,
            last_downloaded_at: model.last_downloaded_at,
            created_at: model.created_at,
        }
    }
}
