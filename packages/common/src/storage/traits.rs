use std::time::Duration;

use async_trait::async_trait;

use super::error::StorageError;
use super::key::ObjectRef;

/// Options controlling how an object is stored.
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// MIME type recorded with the object and served back on download.
    pub content_type: Option<String>,
    /// Object-level TTL. An expired object behaves as absent, bounding both
    /// storage cost and the leak window if a presigned URL escapes.
    pub expires_in: Option<Duration>,
}

impl PutOptions {
    /// Options for a short-lived delivery artifact.
    pub fn temporary(content_type: &str, ttl: Duration) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            expires_in: Some(ttl),
        }
    }

    /// Options for a long-lived object such as an uploaded manuscript.
    pub fn persistent(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            expires_in: None,
        }
    }
}

/// Keyed blob storage with presigned, expiring download URLs.
///
/// Keys are generated by the store from a caller hint; callers persist the
/// returned [`ObjectRef`] and hand it back for reads, deletes, and presigns.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh unguessable key derived from `key_hint`.
    async fn put(
        &self,
        bucket: &str,
        key_hint: &str,
        data: &[u8],
        opts: PutOptions,
    ) -> Result<ObjectRef, StorageError>;

    /// Retrieve all bytes for an object.
    async fn get(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, object: &ObjectRef) -> Result<bool, StorageError>;

    /// Produce a time-limited capability URL granting read access to the
    /// object without further authentication.
    async fn presign(&self, object: &ObjectRef, ttl: Duration) -> Result<String, StorageError>;
}
