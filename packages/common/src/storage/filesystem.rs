use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::error::StorageError;
use super::key::{ObjectRef, unique_key};
use super::presign;
use super::traits::{BlobStore, PutOptions};

/// Filesystem-backed blob store.
///
/// Objects live at `{root}/{bucket}/{key}` with a JSON sidecar at
/// `{root}/{bucket}/{key}.meta` recording content type and optional expiry.
/// Presigned URLs are HS256 capability tokens redeemed by the server's
/// `/files/{token}` endpoint.
pub struct FilesystemBlobStore {
    root: PathBuf,
    /// Base URL of the token-redemption endpoint, without a trailing slash.
    download_base_url: String,
    presign_secret: Vec<u8>,
}

/// Sidecar metadata stored next to each object.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: Option<String>,
    /// Seconds since epoch after which the object behaves as absent.
    expires_at: Option<u64>,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store rooted at `root`.
    pub async fn new(
        root: PathBuf,
        download_base_url: impl Into<String>,
        presign_secret: impl Into<Vec<u8>>,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self {
            root,
            download_base_url: download_base_url.into().trim_end_matches('/').to_string(),
            presign_secret: presign_secret.into(),
        })
    }

    fn object_path(&self, object: &ObjectRef) -> PathBuf {
        self.root.join(&object.bucket).join(&object.key)
    }

    fn meta_path(&self, object: &ObjectRef) -> PathBuf {
        let mut path = self.object_path(object).into_os_string();
        path.push(".meta");
        PathBuf::from(path)
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn read_meta(&self, object: &ObjectRef) -> Result<Option<ObjectMeta>, StorageError> {
        match fs::read(self.meta_path(object)).await {
            Ok(bytes) => {
                let meta = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::Backend(format!("corrupt sidecar for {object}: {e}"))
                })?;
                Ok(Some(meta))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an object and its sidecar, ignoring absence.
    async fn remove_files(&self, object: &ObjectRef) {
        let _ = fs::remove_file(self.object_path(object)).await;
        let _ = fs::remove_file(self.meta_path(object)).await;
    }

    fn now_secs() -> u64 {
        jsonwebtoken::get_current_timestamp()
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(
        &self,
        bucket: &str,
        key_hint: &str,
        data: &[u8],
        opts: PutOptions,
    ) -> Result<ObjectRef, StorageError> {
        let object = ObjectRef::new(bucket, unique_key(key_hint))?;
        let path = self.object_path(&object);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let meta = ObjectMeta {
            content_type: opts.content_type,
            expires_at: opts.expires_in.map(|ttl| Self::now_secs() + ttl.as_secs()),
        };
        let encoded = serde_json::to_vec(&meta)
            .map_err(|e| StorageError::Backend(format!("failed to encode sidecar: {e}")))?;
        if let Err(e) = fs::write(self.meta_path(&object), encoded).await {
            self.remove_files(&object).await;
            return Err(e.into());
        }

        Ok(object)
    }

    async fn get(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError> {
        if let Some(meta) = self.read_meta(object).await?
            && let Some(expires_at) = meta.expires_at
            && Self::now_secs() >= expires_at
        {
            tracing::debug!("removing expired object {object}");
            self.remove_files(object).await;
            return Err(StorageError::NotFound(object.to_string()));
        }

        match fs::read(self.object_path(object)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(object.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, object: &ObjectRef) -> Result<bool, StorageError> {
        let existed = match fs::remove_file(self.object_path(object)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        let _ = fs::remove_file(self.meta_path(object)).await;
        Ok(existed)
    }

    async fn presign(&self, object: &ObjectRef, ttl: Duration) -> Result<String, StorageError> {
        let token = presign::issue(&self.presign_secret, object, ttl)?;
        Ok(format!("{}/{token}", self.download_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_URL: &str = "http://127.0.0.1:3000/api/v1/files";

    async fn temp_store() -> (FilesystemBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(
            dir.path().join("blobs"),
            BASE_URL,
            b"test-secret".to_vec(),
        )
        .await
        .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (store, _dir) = temp_store().await;
        let data = b"%PDF-1.4 fake";
        let object = store
            .put("scripts", "hamlet.pdf", data, PutOptions::default())
            .await
            .unwrap();
        assert_eq!(object.bucket, "scripts");
        assert!(object.key.ends_with("-hamlet.pdf"));
        let retrieved = store.get(&object).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn repeated_puts_use_fresh_keys() {
        let (store, _dir) = temp_store().await;
        let a = store
            .put("scripts", "same.pdf", b"one", PutOptions::default())
            .await
            .unwrap();
        let b = store
            .put("scripts", "same.pdf", b"two", PutOptions::default())
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.get(&a).await.unwrap(), b"one");
        assert_eq!(store.get(&b).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn expired_object_reads_as_absent() {
        let (store, _dir) = temp_store().await;
        let object = store
            .put(
                "downloads",
                "stamped.pdf",
                b"bytes",
                PutOptions::temporary("application/pdf", Duration::ZERO),
            )
            .await
            .unwrap();
        // expires_at == put time, so the object is already past its TTL.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(matches!(
            store.get(&object).await,
            Err(StorageError::NotFound(_))
        ));
        // The expired pass also removed the underlying files.
        assert!(!store.object_path(&object).exists());
    }

    #[tokio::test]
    async fn unexpired_temporary_object_is_served() {
        let (store, _dir) = temp_store().await;
        let object = store
            .put(
                "downloads",
                "stamped.pdf",
                b"bytes",
                PutOptions::temporary("application/pdf", Duration::from_secs(3600)),
            )
            .await
            .unwrap();
        assert_eq!(store.get(&object).await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn get_not_found() {
        let (store, _dir) = temp_store().await;
        let object = ObjectRef::parse("scripts/never-stored.pdf").unwrap();
        assert!(matches!(
            store.get(&object).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_object_and_sidecar() {
        let (store, _dir) = temp_store().await;
        let object = store
            .put(
                "scripts",
                "doomed.pdf",
                b"bytes",
                PutOptions::persistent("application/pdf"),
            )
            .await
            .unwrap();
        assert!(store.delete(&object).await.unwrap());
        assert!(!store.meta_path(&object).exists());
        assert!(matches!(
            store.get(&object).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_nonexistent_returns_false() {
        let (store, _dir) = temp_store().await;
        let object = ObjectRef::parse("scripts/never-stored.pdf").unwrap();
        assert!(!store.delete(&object).await.unwrap());
    }

    #[tokio::test]
    async fn presign_issues_redeemable_token() {
        let (store, _dir) = temp_store().await;
        let object = store
            .put("downloads", "stamped.pdf", b"bytes", PutOptions::default())
            .await
            .unwrap();
        let url = store.presign(&object, Duration::from_secs(3600)).await.unwrap();
        let token = url.strip_prefix(&format!("{BASE_URL}/")).unwrap();
        let verified = presign::verify(b"test-secret", token).unwrap();
        assert_eq!(verified, object);
    }

    #[tokio::test]
    async fn constructor_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("deep/nested/blobs");
        assert!(!base.exists());

        let _store = FilesystemBlobStore::new(base.clone(), BASE_URL, b"s".to_vec())
            .await
            .unwrap();

        assert!(base.exists());
        assert!(base.join(".tmp").exists());
    }
}
