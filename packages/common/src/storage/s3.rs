use std::time::Duration;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use super::error::StorageError;
use super::key::{ObjectRef, unique_key};
use super::traits::{BlobStore, PutOptions};

/// Tag applied to temporary objects so a bucket lifecycle rule can purge
/// anything that outlives its presigned URL.
const TEMPORARY_TAG: (&str, &str) = ("stagedoor-expiry", "temporary");

/// S3-compatible blob store (AWS S3, MinIO, and friends).
///
/// Presigned URLs come straight from the backend. Object-level expiry for
/// temporary artifacts is delegated to a lifecycle rule matching
/// [`TEMPORARY_TAG`]; the presigned URL itself stops working at its TTL
/// either way.
pub struct S3BlobStore {
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3BlobStore {
    pub fn new(
        region_name: &str,
        endpoint: Option<&str>,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                region: region_name.to_string(),
                endpoint: endpoint.trim_end_matches('/').to_string(),
            },
            None => region_name
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid S3 region: {e}")))?,
        };
        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Backend(format!("invalid S3 credentials: {e}")))?;
        Ok(Self {
            region,
            // Custom endpoints (MinIO) require path-style addressing.
            path_style: endpoint.is_some(),
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StorageError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::Backend(format!("failed to open bucket {name}: {e}")))?;
        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

fn check_status(object: &ObjectRef, status: u16) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(object.to_string())),
        other => Err(StorageError::Backend(format!(
            "unexpected status {other} for {object}"
        ))),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        bucket: &str,
        key_hint: &str,
        data: &[u8],
        opts: PutOptions,
    ) -> Result<ObjectRef, StorageError> {
        let object = ObjectRef::new(bucket, unique_key(key_hint))?;
        let handle = self.bucket(bucket)?;

        let content_type = opts
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let response = handle
            .put_object_with_content_type(&object.key, data, content_type)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        check_status(&object, response.status_code())?;

        if opts.expires_in.is_some() {
            let response = handle
                .put_object_tagging(&object.key, &[TEMPORARY_TAG])
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            check_status(&object, response.status_code())?;
        }

        Ok(object)
    }

    async fn get(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError> {
        let handle = self.bucket(&object.bucket)?;
        let response = handle
            .get_object(&object.key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        check_status(object, response.status_code())?;
        Ok(response.bytes().to_vec())
    }

    async fn delete(&self, object: &ObjectRef) -> Result<bool, StorageError> {
        let handle = self.bucket(&object.bucket)?;
        let response = handle
            .delete_object(&object.key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        match response.status_code() {
            200..=299 => Ok(true),
            404 => Ok(false),
            other => Err(StorageError::Backend(format!(
                "unexpected status {other} deleting {object}"
            ))),
        }
    }

    async fn presign(&self, object: &ObjectRef, ttl: Duration) -> Result<String, StorageError> {
        let handle = self.bucket(&object.bucket)?;
        let secs = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX);
        handle
            .presign_get(&object.key, secs, None)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}
