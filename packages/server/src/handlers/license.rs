use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use common::LicenseStatus;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::instrument;
use uuid::Uuid;

use crate::delivery::service;
use crate::entity::{license, script, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::delivery::DownloadResponse;
use crate::models::license::{CreateLicenseRequest, LicenseResponse};
use crate::state::AppState;
use crate::utils::client_ip;

#[utoipa::path(
    post,
    path = "/api/v1/licenses",
    tag = "Licenses",
    operation_id = "createLicense",
    summary = "Record a purchased license",
    description = "Bookkeeping endpoint recording a license grant; payment \
        confirmation happens outside this service. Status defaults to `pending`.",
    request_body = CreateLicenseRequest,
    responses(
        (status = 201, description = "License recorded", body = LicenseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Script or theater not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn create_license(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateLicenseRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("license:create")?;

    if payload.license_type.trim().is_empty() {
        return Err(AppError::Validation("license_type is required".into()));
    }

    script::Entity::find_by_id(payload.script_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Script not found".into()))?;
    user::Entity::find_by_id(payload.theater_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Theater not found".into()))?;

    let now = Utc::now();
    let model = license::ActiveModel {
        id: Set(Uuid::now_v7()),
        script_id: Set(payload.script_id),
        theater_id: Set(payload.theater_id),
        license_type: Set(payload.license_type.trim().to_string()),
        status: Set(payload.status.unwrap_or(LicenseStatus::Pending)),
        expires_at: Set(payload.expires_at),
        performance_dates: Set(serde_json::to_value(&payload.performance_dates)
            .map_err(|e| AppError::Validation(format!("Invalid performance dates: {e}")))?),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let saved = model.insert(&state.db).await?;

    Ok((StatusCode::CREATED, Json(LicenseResponse::from(saved))))
}

#[utoipa::path(
    get,
    path = "/api/v1/licenses/{id}",
    tag = "Licenses",
    operation_id = "getLicense",
    summary = "Get a license",
    description = "Visible to the licensee, the script's playwright, and admins; \
        anyone else sees not-found.",
    params(("id" = String, Path, description = "License ID (UUID)")),
    responses(
        (status = 200, description = "License detail", body = LicenseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "License not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_license(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LicenseResponse>, AppError> {
    let license_id =
        Uuid::parse_str(&id).map_err(|_| AppError::Validation("Invalid license ID".into()))?;

    let model = license::Entity::find_by_id(license_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let script = script::Entity::find_by_id(model.script_id)
        .one(&state.db)
        .await?;
    let playwright_id = script.map(|s| s.playwright_id);

    let visible = auth_user.user_id == model.theater_id
        || playwright_id == Some(auth_user.user_id)
        || auth_user.is_admin();
    if !visible {
        return Err(AppError::NotFound("License not found".into()));
    }

    Ok(Json(LicenseResponse::from(model)))
}

#[utoipa::path(
    get,
    path = "/api/v1/licenses/{id}/download",
    tag = "Licenses",
    operation_id = "downloadLicensedScript",
    summary = "Download the licensed, watermarked full script",
    description = "Re-validates the license (ownership, status, expiry), generates \
        a freshly watermarked artifact, and returns a presigned, expiring URL.",
    params(("id" = String, Path, description = "License ID (UUID)")),
    responses(
        (status = 200, description = "Presigned download", body = DownloadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "License not active or expired (FORBIDDEN)", body = ErrorBody),
        (status = 404, description = "License or file not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Processing or storage failure", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(user_id = auth_user.user_id))]
pub async fn download_license(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DownloadResponse>, AppError> {
    let license_id =
        Uuid::parse_str(&id).map_err(|_| AppError::Validation("Invalid license ID".into()))?;

    let response =
        service::deliver_license(&state, &auth_user, license_id, client_ip(&headers)).await?;
    Ok(Json(response))
}
