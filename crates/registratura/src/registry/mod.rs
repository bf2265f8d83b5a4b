//! The municipal registry: registration numbers, intake filtering, and the
//! record lifecycle from inbound message to official document.

pub mod filter;
pub mod ingest;
pub mod number;
pub mod record;
pub mod service;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use number::{format_registration_number, RegistrationNumberGenerator, DEFAULT_PREFIX};
pub use record::{
    AttachmentRecord, Assignment, OfficialDocument, Priority, RecordStatus, RegistryRecord,
};
pub use service::{
    IngestOutcome, IngestReport, ProcessAttachmentsReport, RegistryService, RegistrySettings,
};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid message: {0}")]
    Validation(String),

    #[error("Registry record '{0}' not found")]
    NotFound(String),

    #[error("Registration counter for {year} still contended after {attempts} attempts")]
    CounterContention { year: i32, attempts: u32 },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] crate::email::EmailError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
}

impl RegistryError {
    /// Whether retrying the same item later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::CounterContention { .. } | RegistryError::Timeout { .. } => true,
            RegistryError::Database(e) => e.is_busy(),
            RegistryError::Storage(crate::error::StorageError::Timeout { .. })
            | RegistryError::Storage(crate::error::StorageError::Http { .. }) => true,
            RegistryError::Mailbox(_) => true,
            _ => false,
        }
    }
}

/// Bounds an external call. Expiry becomes [`RegistryError::Timeout`].
pub(crate) async fn with_timeout<T, E, F>(
    limit: Duration,
    operation: &str,
    fut: F,
) -> Result<T, RegistryError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<RegistryError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(RegistryError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}
