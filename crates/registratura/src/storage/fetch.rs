use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::BlobStore;
use crate::error::StorageError;

/// Retrieves an original by the download URL recorded for it.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError>;
}

/// Resolves URLs owned by the blob store directly against the store and
/// fetches anything else over HTTP.
pub struct UrlFetcher {
    store: Arc<dyn BlobStore>,
    http: reqwest::Client,
}

impl UrlFetcher {
    pub fn new(store: Arc<dyn BlobStore>, timeout: Duration) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Http {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { store, http })
    }
}

#[async_trait]
impl AttachmentFetcher for UrlFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        if let Some(path) = self.store.path_for_url(url) {
            return self.store.download(&path).await;
        }

        let http_err = |reason: String| StorageError::Http {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| http_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_err(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| http_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
