//! Write-once storage for uploaded files.
//!
//! A handle is the SHA-256 of the content in hex, plus the extension of the
//! sniffed file type when there is one, so storing the same bytes twice
//! yields the same handle and never rewrites the file.

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, bytes: &[u8]) -> AppResult<String>;
    async fn contains(&self, handle: &str) -> AppResult<bool>;
}

pub fn handle_for(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    match infer::get(bytes) {
        Some(kind) => format!("{digest}.{}", kind.extension()),
        None => digest,
    }
}

/// Handles are plain file names; anything else could escape the blob root.
pub fn is_handle(handle: &str) -> bool {
    let (digest, ext) = handle.split_once('.').unwrap_or((handle, ""));
    digest.len() == 64
        && digest.bytes().all(|b| b.is_ascii_hexdigit())
        && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub async fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn store(&self, bytes: &[u8]) -> AppResult<String> {
        if bytes.is_empty() {
            return Err(AppError::bad_request("the upload is empty"));
        }
        let handle = handle_for(bytes);
        let path = self.root.join(&handle);
        if fs::try_exists(&path).await? {
            return Ok(handle);
        }

        // readers never see a partial file
        let staging = self.root.join(format!(".{}.part", nanoid::nanoid!()));
        fs::write(&staging, bytes).await?;
        fs::rename(&staging, &path).await?;

        tracing::debug!(%handle, size = bytes.len(), "blob stored");
        Ok(handle)
    }

    async fn contains(&self, handle: &str) -> AppResult<bool> {
        if !is_handle(handle) {
            return Ok(false);
        }
        Ok(fs::try_exists(self.root.join(handle)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn handles_carry_the_sniffed_extension() {
        let handle = handle_for(PNG_HEADER);
        assert!(handle.ends_with(".png"));
        assert!(is_handle(&handle));
        assert!(!handle_for(b"plain words").contains('.'));
    }

    #[test]
    fn path_like_handles_are_refused() {
        assert!(!is_handle("../etc/passwd"));
        assert!(!is_handle(&format!("{}.p/g", "a".repeat(64))));
        assert!(is_handle(&"0".repeat(64)));
    }

    #[tokio::test]
    async fn storing_twice_keeps_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = DiskBlobStore::open(dir.path()).await.unwrap();

        let first = blobs.store(PNG_HEADER).await.unwrap();
        let second = blobs.store(PNG_HEADER).await.unwrap();
        assert_eq!(first, second);
        assert!(blobs.contains(&first).await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), PNG_HEADER);
    }

    #[tokio::test]
    async fn empty_uploads_are_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = DiskBlobStore::open(dir.path()).await.unwrap();
        assert!(matches!(blobs.store(&[]).await, Err(AppError::BadRequest(_))));
    }
}
