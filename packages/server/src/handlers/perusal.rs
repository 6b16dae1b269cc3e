use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::{Duration, Utc};
use common::PerusalRequestStatus;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::instrument;
use uuid::Uuid;

use crate::delivery::service;
use crate::entity::{perusal_request, script};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::delivery::DownloadResponse;
use crate::models::perusal::PerusalRequestResponse;
use crate::state::AppState;
use crate::utils::client_ip;

#[utoipa::path(
    post,
    path = "/api/v1/scripts/{id}/perusal",
    tag = "Perusal",
    operation_id = "createPerusalRequest",
    summary = "Request a perusal copy of a script",
    description = "Creates a perusal request for the calling user. Requests are \
        auto-approved and expire after a short window.",
    params(("id" = i32, Path, description = "Script ID")),
    responses(
        (status = 201, description = "Perusal request created", body = PerusalRequestResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Script not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(script_id = id, user_id = auth_user.user_id))]
pub async fn create_perusal_request(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    script::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Script not found".into()))?;

    let now = Utc::now();
    let model = perusal_request::ActiveModel {
        id: Set(Uuid::now_v7()),
        script_id: Set(id),
        requester_id: Set(auth_user.user_id),
        // Auto-approved in current behavior; the expiry window still bounds it.
        status: Set(PerusalRequestStatus::Approved),
        expires_at: Set(now + Duration::days(state.config.delivery.perusal_expiry_days)),
        download_count: Set(0),
        last_downloaded_at: Set(None),
        created_at: Set(now),
    };
    let saved = model.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(PerusalRequestResponse::from(saved)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/scripts/perusal/{request_id}/download",
    tag = "Perusal",
    operation_id = "downloadPerusal",
    summary = "Download a watermarked perusal copy",
    description = "Re-validates the perusal request, generates a freshly watermarked \
        artifact, and returns a presigned, expiring URL.",
    params(("request_id" = String, Path, description = "Perusal request ID (UUID)")),
    responses(
        (status = 200, description = "Presigned download", body = DownloadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Request not approved or expired (FORBIDDEN)", body = ErrorBody),
        (status = 404, description = "Request or file not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Processing or storage failure", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(user_id = auth_user.user_id))]
pub async fn download_perusal(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DownloadResponse>, AppError> {
    let request_id = Uuid::parse_str(&request_id)
        .map_err(|_| AppError::Validation("Invalid perusal request ID".into()))?;

    let response =
        service::deliver_perusal(&state, &auth_user, request_id, client_ip(&headers)).await?;
    Ok(Json(response))
}
