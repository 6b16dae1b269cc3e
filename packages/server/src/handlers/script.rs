use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use common::pdf;
use common::storage::{ObjectRef, PutOptions};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};

use crate::entity::script;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::script::{CreateScriptRequest, ScriptFileResponse, ScriptResponse};
use crate::state::AppState;
use crate::utils::filename::validate_flat_filename;

pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(64 * 1024 * 1024) // 64 MB
}

#[utoipa::path(
    post,
    path = "/api/v1/scripts",
    tag = "Scripts",
    operation_id = "createScript",
    summary = "Create a script",
    request_body = CreateScriptRequest,
    responses(
        (status = 201, description = "Script created", body = ScriptResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn create_script(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateScriptRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("script:create")?;

    let title = payload.title.trim().to_string();
    if title.is_empty() || title.chars().count() > 256 {
        return Err(AppError::Validation("Title must be 1-256 characters".into()));
    }

    let now = Utc::now();
    let model = script::ActiveModel {
        title: Set(title),
        synopsis: Set(payload.synopsis),
        playwright_id: Set(auth_user.user_id),
        file_ref: Set(None),
        perusal_ref: Set(None),
        file_sha256: Set(None),
        page_count: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let saved = model.insert(&state.db).await?;

    Ok((StatusCode::CREATED, Json(ScriptResponse::from(saved))))
}

#[utoipa::path(
    get,
    path = "/api/v1/scripts/{id}",
    tag = "Scripts",
    operation_id = "getScript",
    summary = "Get script metadata",
    params(("id" = i32, Path, description = "Script ID")),
    responses(
        (status = 200, description = "Script metadata", body = ScriptResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Script not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user), fields(script_id = id))]
pub async fn get_script(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ScriptResponse>, AppError> {
    let model = find_script(&state, id).await?;
    Ok(Json(ScriptResponse::from(model)))
}

#[utoipa::path(
    post,
    path = "/api/v1/scripts/{id}/file",
    tag = "Scripts",
    operation_id = "uploadScriptFile",
    summary = "Upload the script manuscript",
    description = "Uploads the full manuscript PDF in the `file` multipart field. \
        Stores the original, derives a page-limited perusal copy, and records the \
        checksum and page count. Re-uploading replaces the previous objects.",
    params(("id" = i32, Path, description = "Script ID")),
    request_body(content_type = "multipart/form-data", description = "Manuscript PDF upload"),
    responses(
        (status = 200, description = "Manuscript stored", body = ScriptFileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Script not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Processing or storage failure", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(script_id = id))]
pub async fn upload_script_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ScriptFileResponse>, AppError> {
    let model = find_script(&state, id).await?;
    require_script_ownership(&auth_user, &model)?;

    let (filename, data) = read_file_field(&mut multipart).await?;
    if data.len() as u64 > state.config.storage.max_script_size {
        return Err(AppError::Validation(format!(
            "File exceeds maximum size of {} bytes",
            state.config.storage.max_script_size
        )));
    }

    // Client-supplied bytes that fail to parse are a validation problem,
    // not an operational one.
    let pages = pdf::page_count(&data)
        .map_err(|e| AppError::Validation(format!("Uploaded file is not a readable PDF: {e}")))?;
    if pages == 0 {
        return Err(AppError::Validation("Uploaded PDF has no pages".into()));
    }

    let perusal = pdf::derive_perusal(&data, state.config.delivery.perusal_max_pages)?;
    let digest = hex::encode(Sha256::digest(&data));

    let file_object = state
        .blob_store
        .put(
            &state.config.storage.scripts_bucket,
            &filename,
            &data,
            PutOptions::persistent("application/pdf"),
        )
        .await?;
    let perusal_object = state
        .blob_store
        .put(
            &state.config.storage.scripts_bucket,
            &format!("perusal-{filename}"),
            &perusal,
            PutOptions::persistent("application/pdf"),
        )
        .await?;

    let previous = [model.file_ref.clone(), model.perusal_ref.clone()];

    let mut active = model.into_active_model();
    active.file_ref = Set(Some(file_object.to_string()));
    active.perusal_ref = Set(Some(perusal_object.to_string()));
    active.file_sha256 = Set(Some(digest.clone()));
    active.page_count = Set(Some(pages as i32));
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    delete_stale_objects(&state, previous.into_iter().flatten()).await;

    Ok(Json(ScriptFileResponse {
        script_id: updated.id,
        page_count: pages as i32,
        sha256: digest,
        size: data.len() as u64,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/scripts/{id}",
    tag = "Scripts",
    operation_id = "deleteScript",
    summary = "Delete a script",
    description = "Removes the script row and best-effort deletes its stored objects.",
    params(("id" = i32, Path, description = "Script ID")),
    responses(
        (status = 204, description = "Script deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Script not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(script_id = id))]
pub async fn delete_script(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let model = find_script(&state, id).await?;
    require_script_ownership(&auth_user, &model)?;

    let stored = [model.file_ref.clone(), model.perusal_ref.clone()];

    script::Entity::delete_by_id(id).exec(&state.db).await?;

    delete_stale_objects(&state, stored.into_iter().flatten()).await;

    Ok(StatusCode::NO_CONTENT)
}

async fn find_script(state: &AppState, id: i32) -> Result<script::Model, AppError> {
    script::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Script not found".into()))
}

fn require_script_ownership(auth_user: &AuthUser, model: &script::Model) -> Result<(), AppError> {
    if model.playwright_id == auth_user.user_id || auth_user.is_admin() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// Read the `file` multipart field into memory, validating its filename.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }

        let filename = field
            .file_name()
            .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
        let filename = validate_flat_filename(filename)
            .map_err(|e| AppError::Validation(e.message().into()))?
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?;
        if data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }
        return Ok((filename, data.to_vec()));
    }

    Err(AppError::Validation("Missing 'file' field".into()))
}

/// Best-effort removal of replaced or orphaned objects.
async fn delete_stale_objects(state: &AppState, refs: impl Iterator<Item = String>) {
    for stored in refs {
        match ObjectRef::parse(&stored) {
            Ok(object) => {
                if let Err(e) = state.blob_store.delete(&object).await {
                    warn!("failed to delete stale object {stored}: {e}");
                }
            }
            Err(e) => warn!("skipping unparseable stored ref {stored}: {e}"),
        }
    }
}
