use chrono::{DateTime, Utc};
use common::LicenseStatus;
use serde::{Deserialize, Serialize};

use crate::entity::license;

/// One planned performance, recorded on the license and burned into the
/// watermark.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct PerformanceDate {
    #[schema(example = "2026-09-12")]
    pub date: String,
    #[schema(example = "Main Stage")]
    pub venue: Option<String>,
}

/// Request DTO recording a purchased license (admin bookkeeping; payment
/// confirmation itself happens outside this service).
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateLicenseRequest {
    pub script_id: i32,
    pub theater_id: i32,
    #[schema(example = "standard")]
    pub license_type: String,
    /// Defaults to `pending` when omitted.
    pub status: Option<LicenseStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub performance_dates: Vec<PerformanceDate>,
}

/// Response DTO for a license.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LicenseResponse {
    /// License ID (UUIDv7).
    pub id: String,
    pub script_id: i32,
    pub theater_id: i32,
    pub license_type: String,
    pub status: LicenseStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub performance_dates: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<license::Model> for LicenseResponse {
    fn from(model: license::Model) -> Self {
        Self {
            id: model.id.to_string(),
            script_id: model.script_id,
            theater_id: model.theater_id,
            license_type: model.license_type,
            status: model.status,
            expires_at: model.expires_at,
            performance_dates: model.performance_dates,
            created_at: model.created_at,
        }
    }
}
