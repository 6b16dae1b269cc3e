use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::error::StorageError;
use super::key::ObjectRef;

/// Claims carried by a presigned download token.
#[derive(Debug, Serialize, Deserialize)]
struct DownloadClaims {
    /// Bucket name.
    b: String,
    /// Object key.
    k: String,
    /// Expiration timestamp (seconds since epoch).
    exp: u64,
}

/// Issue a presigned download token for an object.
///
/// The token is an HS256 JWT: the capability is self-describing and needs no
/// server-side token table, and the backend's `exp` check bounds its life.
pub fn issue(secret: &[u8], object: &ObjectRef, ttl: Duration) -> Result<String, StorageError> {
    let exp = jsonwebtoken::get_current_timestamp() + ttl.as_secs();
    let claims = DownloadClaims {
        b: object.bucket.clone(),
        k: object.key.clone(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| StorageError::Backend(format!("failed to sign download token: {e}")))
}

/// Verify a presigned download token and return the object it grants.
///
/// Rejects tampered, foreign-secret, and expired tokens. No leeway is
/// allowed: once the TTL elapses the capability is dead.
pub fn verify(secret: &[u8], token: &str) -> Result<ObjectRef, StorageError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let data = decode::<DownloadClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|_| StorageError::InvalidToken)?;
    ObjectRef::new(data.claims.b, data.claims.k)
}
