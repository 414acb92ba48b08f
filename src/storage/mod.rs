//! Durable object storage for captured thumbnails.
//!
//! The pipeline only ever talks to [`ObjectStore`], so the backing service
//! is swappable. The default [`FsObjectStore`] keeps objects under a local
//! directory and hands out `file://` URLs, which is all a single-machine
//! deployment needs.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::db::models::UserId;
use crate::errors::TransferError;

/// Opaque reference to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHandle {
    key: String,
}

impl StorageHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, overwriting any previous object.
    async fn upload_bytes(&self, key: &str, bytes: Vec<u8>)
        -> Result<StorageHandle, TransferError>;

    /// Resolve an uploaded object to a retrievable URL.
    async fn download_url(&self, handle: &StorageHandle) -> Result<String, TransferError>;
}

/// Storage key for one captured thumbnail, scoped to the owning user.
pub fn thumbnail_key(user: &UserId, timestamp: i64, file_name: &str) -> String {
    format!("users/{user}/thumbnails/{timestamp}_{file_name}")
}

/// Read a local thumbnail and move it into durable storage.
///
/// Fails with [`TransferError::SourceUnavailable`] when the local file has
/// already disappeared. Callers treat any failure here as best-effort: the
/// commit is still recorded, just without a durable URL.
pub async fn transfer_thumbnail(
    store: &dyn ObjectStore,
    key: &str,
    local_path: &Path,
) -> Result<String, TransferError> {
    let bytes = tokio::fs::read(local_path)
        .await
        .map_err(|source| TransferError::SourceUnavailable {
            path: local_path.to_path_buf(),
            source,
        })?;
    let handle = store.upload_bytes(key, bytes).await?;
    store.download_url(&handle).await
}

/// Object store rooted in a local directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn upload_error(key: &str, err: io::Error, msg: &'static str) -> TransferError {
    TransferError::Upload {
        key: key.to_string(),
        source: anyhow::Error::new(err).context(msg),
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<StorageHandle, TransferError> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| upload_error(key, err, "failed to create object directory"))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|err| upload_error(key, err, "failed to write object"))?;
        Ok(StorageHandle::new(key))
    }

    async fn download_url(&self, handle: &StorageHandle) -> Result<String, TransferError> {
        let path = self.object_path(handle.key());
        // Canonical path, so the URL stays valid if the process later
        // changes its working directory.
        let absolute = tokio::fs::canonicalize(&path)
            .await
            .map_err(|err| upload_error(handle.key(), err, "uploaded object cannot be resolved"))?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_per_user_and_commit() {
        let user = UserId::new("u1");
        assert_eq!(
            thumbnail_key(&user, 1_704_947_400, "piece_1704947400.png"),
            "users/u1/thumbnails/1704947400_piece_1704947400.png"
        );
    }

    #[tokio::test]
    async fn uploads_land_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let handle = store
            .upload_bytes("users/u1/thumbnails/1_a.png", vec![1, 2, 3])
            .await
            .unwrap();
        let stored = std::fs::read(dir.path().join("users/u1/thumbnails/1_a.png")).unwrap();
        assert_eq!(stored, vec![1, 2, 3]);

        let url = store.download_url(&handle).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("1_a.png"));
    }

    #[tokio::test]
    async fn transfer_reads_uploads_and_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("thumb.png");
        std::fs::write(&local, b"png bytes").unwrap();
        let store = FsObjectStore::new(dir.path().join("objects"));

        let url = transfer_thumbnail(&store, "users/u1/thumbnails/1_thumb.png", &local)
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(dir
            .path()
            .join("objects/users/u1/thumbnails/1_thumb.png")
            .exists());
    }

    #[tokio::test]
    async fn missing_source_is_reported_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let err = transfer_thumbnail(&store, "users/u1/thumbnails/1_gone.png", &dir.path().join("gone.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::SourceUnavailable { .. }));
    }
}
