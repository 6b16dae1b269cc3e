use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use common::storage::{StorageError, presign};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

/// Stable message for every way a capability URL can fail: invalid, expired,
/// or pointing at an already-purged object. Capability URLs never reveal
/// which.
const LINK_GONE: &str = "Download link is invalid or has expired";

#[utoipa::path(
    get,
    path = "/api/v1/files/{token}",
    tag = "Files",
    operation_id = "redeemDownloadToken",
    summary = "Redeem a presigned download token",
    description = "Serves the object granted by a presigned capability token \
        issued by the filesystem storage backend. No authentication: the token \
        itself is the capability.",
    params(("token" = String, Path, description = "Presigned download token")),
    responses(
        (status = 200, description = "Object content"),
        (status = 404, description = "Link invalid or expired (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody),
    ),
)]
#[instrument(skip(state, token))]
pub async fn redeem_download_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let Some(secret) = state.config.storage.presign_secret.as_deref() else {
        // S3 deployments presign directly against the backend; this endpoint
        // has nothing to redeem.
        return Err(AppError::NotFound(LINK_GONE.into()));
    };

    let object = presign::verify(secret.as_bytes(), &token)
        .map_err(|_| AppError::NotFound(LINK_GONE.into()))?;

    let bytes = match state.blob_store.get(&object).await {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound(_)) => return Err(AppError::NotFound(LINK_GONE.into())),
        Err(e) => return Err(e.into()),
    };

    let content_type = mime_guess::from_path(&object.key)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(display_filename(&object.key)),
        )
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(axum::body::Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

/// Strip the random key prefix so the browser sees the human-oriented name.
fn display_filename(key: &str) -> &str {
    let tail = key.rsplit('/').next().unwrap_or(key);
    tail.split_once('-').map(|(_, rest)| rest).unwrap_or(tail)
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_filename_strips_random_prefix() {
        assert_eq!(
            display_filename("0a1b2c3d4e5f60718293a4b5c6d7e8f9-hamlet-0193aaaa.pdf"),
            "hamlet-0193aaaa.pdf"
        );
        assert_eq!(display_filename("plain.pdf"), "plain.pdf");
        assert_eq!(
            display_filename("nested/0a1b2c-seagull.pdf"),
            "seagull.pdf"
        );
    }

    #[test]
    fn content_disposition_is_header_safe() {
        let value = content_disposition_value("a \"quoted\"; name.pdf");
        assert!(value.starts_with("attachment; filename=\""));
        assert!(!value.contains("\";;"));

        let fallback = content_disposition_value("\u{3042}\u{3044}");
        assert!(fallback.contains("filename=\"download\""));
    }
}
