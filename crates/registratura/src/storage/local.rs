use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{validate_path, BlobRef, BlobStore};
use crate::error::StorageError;

/// Blob store on the local filesystem, served under a public base URL.
///
/// Writes go to a temporary sibling file and are renamed into place, so a
/// reader never observes a partially written blob.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(path.split('/').fold(self.root.clone(), |acc, s| acc.join(s)))
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<BlobRef, StorageError> {
        let target = self.full_path(path)?;
        if let Some(parent) = target.parent() {
            self.ensure_directory(parent).await?;
        }

        let tmp = target.with_file_name(format!(
            ".{}.{}.tmp",
            target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("blob"),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: tmp.clone(),
                source: e,
            })?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::WriteFile {
                path: target,
                source: e,
            });
        }

        let content_type = content_type
            .map(str::to_string)
            .or_else(|| mime_guess::from_path(path).first().map(|m| m.to_string()));

        tracing::debug!(path, size = bytes.len(), "Blob stored");

        Ok(BlobRef {
            path: path.to_string(),
            size: bytes.len() as u64,
            content_type,
        })
    }

    async fn download_url(&self, blob: &BlobRef) -> Result<String, StorageError> {
        validate_path(&blob.path)?;
        Ok(format!("{}/{}", self.public_base_url, blob.path))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.full_path(path)?;
        let found = tokio::fs::try_exists(&full).await;
        found.map_err(|source| StorageError::ReadFile { path: full, source })
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.full_path(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::ReadFile {
                path: full,
                source: e,
            }),
        }
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(&self.public_base_url)?.strip_prefix('/')?;
        validate_path(rest).ok()?;
        Some(rest.to_string())
    }
}
