//! Upload of a message's original attachments.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use super::record::AttachmentRecord;
use super::{with_timeout, RegistryError};
use crate::email::EmailAttachment;
use crate::sanitize::safe_storage_name;
use crate::storage::{attachment_path, BlobStore};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Attachments stored for one message plus per-file failures.
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub stored: Vec<AttachmentRecord>,
    pub errors: Vec<String>,
}

/// Inserts `_{n}` before the extension: `cerere.pdf` → `cerere_2.pdf`.
fn with_suffix(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], n, &name[dot..]),
        _ => format!("{}_{}", name, n),
    }
}

/// Picks a storage name that neither an earlier attachment of this message
/// nor an existing blob already uses.
async fn unique_storage_name(
    store: &dyn BlobStore,
    registration_number: &str,
    safe_name: &str,
    taken: &HashSet<String>,
    timeout: Duration,
) -> Result<String, RegistryError> {
    let mut candidate = safe_name.to_string();
    let mut n = 1;
    loop {
        if !taken.contains(&candidate) {
            let path = attachment_path(registration_number, &candidate);
            let exists = with_timeout(timeout, "blob exists check", store.exists(&path)).await?;
            if !exists {
                return Ok(candidate);
            }
        }
        n += 1;
        candidate = with_suffix(safe_name, n);
    }
}

/// Stores one original under `registratura/{number}/attachments/`.
pub async fn upload_attachment(
    store: &dyn BlobStore,
    registration_number: &str,
    attachment: &EmailAttachment,
    taken: &mut HashSet<String>,
    timeout: Duration,
) -> Result<AttachmentRecord, RegistryError> {
    let safe = safe_storage_name(&attachment.filename);
    let name = unique_storage_name(store, registration_number, &safe, taken, timeout).await?;
    let path = attachment_path(registration_number, &name);

    let declared = attachment
        .content_type
        .as_deref()
        .filter(|ct| !ct.trim().is_empty());
    let blob = with_timeout(
        timeout,
        "attachment upload",
        store.upload(&path, &attachment.content, declared),
    )
    .await?;
    let download_url = with_timeout(timeout, "attachment url", store.download_url(&blob)).await?;

    taken.insert(name);

    let content_type = blob
        .content_type
        .clone()
        .or_else(|| declared.map(str::to_string))
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

    debug!(path = %blob.path, size = blob.size, content_type = %content_type, "Stored attachment");

    Ok(AttachmentRecord {
        filename: attachment.filename.clone(),
        storage_path: blob.path,
        download_url,
        content_type,
        size: blob.size,
        uploaded_at: Utc::now(),
    })
}

/// Uploads every attachment, continuing past failures.
pub async fn upload_attachments(
    store: &dyn BlobStore,
    registration_number: &str,
    attachments: &[EmailAttachment],
    timeout: Duration,
) -> UploadSummary {
    let mut summary = UploadSummary::default();
    let mut taken = HashSet::new();

    for attachment in attachments {
        match upload_attachment(store, registration_number, attachment, &mut taken, timeout).await {
            Ok(record) => summary.stored.push(record),
            Err(e) => {
                warn!(filename = %attachment.filename, error = %e, "Attachment upload failed");
                summary.errors.push(format!("{}: {}", attachment.filename, e));
            }
        }
    }

    summary
}
