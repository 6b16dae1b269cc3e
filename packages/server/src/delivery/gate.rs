use chrono::{DateTime, Utc};
use common::PerusalRequestStatus;

use crate::entity::{license, perusal_request, script};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;

/// True when an expiry timestamp has elapsed.
///
/// Expiry is always computed at check time against the caller-supplied
/// `now`; it is never a stored status value, so there is no stale state to
/// invalidate.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}

/// Authorize a full-script download against a license.
///
/// Evaluated on every request; authorization decisions are never cached.
/// Ownership mismatches are reported as not-found so callers cannot probe
/// for other tenants' license ids.
pub fn check_license_download(
    caller: &AuthUser,
    license: &license::Model,
    script: &script::Model,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let entitled = caller.user_id == license.theater_id
        || caller.user_id == script.playwright_id
        || caller.is_admin();
    if !entitled {
        return Err(AppError::NotFound("License not found".into()));
    }
    if is_expired(license.expires_at, now) {
        return Err(AppError::Forbidden("License has expired".into()));
    }
    if !license.status.authorizes_download() {
        return Err(AppError::Forbidden("License is not active".into()));
    }
    if script.file_ref.is_none() {
        return Err(AppError::NotFound("Script file not available".into()));
    }
    Ok(())
}

/// Authorize a perusal download against a perusal request.
pub fn check_perusal_download(
    caller: &AuthUser,
    request: &perusal_request::Model,
    script: &script::Model,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let entitled = caller.user_id == request.requester_id || caller.is_admin();
    if !entitled {
        return Err(AppError::NotFound("Perusal request not found".into()));
    }
    if is_expired(Some(request.expires_at), now) {
        return Err(AppError::Forbidden("Perusal request has expired".into()));
    }
    if request.status != PerusalRequestStatus::Approved {
        return Err(AppError::Forbidden("Perusal request is not approved".into()));
    }
    if script.perusal_ref.is_none() {
        return Err(AppError::NotFound("Perusal file not available".into()));
    }
    Ok(())
}
