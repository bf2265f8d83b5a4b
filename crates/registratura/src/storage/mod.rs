//! Blob storage for original attachments and generated documents.

pub mod fetch;
pub mod local;

use async_trait::async_trait;

use crate::error::StorageError;

pub use fetch::{AttachmentFetcher, UrlFetcher};
pub use local::LocalBlobStore;

/// What the store reports about a written blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub path: String,
    pub size: u64,
    /// Content type as recorded by the store, if it tracks one.
    pub content_type: Option<String>,
}

/// Path-addressed object storage with public download URLs.
///
/// Paths are `/`-separated and relative, e.g.
/// `registratura/REG-2025-000001/attachments/cerere.pdf`. Uploading to an
/// existing path replaces the blob.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<BlobRef, StorageError>;

    async fn download_url(&self, blob: &BlobRef) -> Result<String, StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Maps one of this store's download URLs back to its path.
    fn path_for_url(&self, url: &str) -> Option<String>;
}

/// Storage path of an original attachment.
pub fn attachment_path(registration_number: &str, safe_filename: &str) -> String {
    format!(
        "registratura/{}/attachments/{}",
        registration_number, safe_filename
    )
}

/// File name of every record's official document.
pub const OFFICIAL_DOCUMENT_NAME: &str = "document-oficial.pdf";

/// Storage path of a record's official document.
pub fn official_document_path(registration_number: &str) -> String {
    format!(
        "registratura/{}/official/{}",
        registration_number, OFFICIAL_DOCUMENT_NAME
    )
}

/// Rejects empty, absolute and parent-relative paths.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}
