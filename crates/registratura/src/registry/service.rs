//! Record lifecycle: intake from the mailbox, normalization into the
//! official document, workflow updates and removal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::filter::{is_duplicate, is_spam};
use super::ingest::upload_attachments;
use super::number::RegistrationNumberGenerator;
use super::record::{
    Assignment, OfficialDocument, Priority, RecordStatus, RegistryRecord,
};
use super::{with_timeout, RegistryError};
use crate::db::registry_repo::{self, RecordFilter};
use crate::db::{claim_repo, Database};
use crate::email::{IncomingEmail, Mailbox};
use crate::pipeline::{DocumentPipeline, ProcessOptions};
use crate::processor::{SourceFile, StampPosition};
use crate::sanitize::redact_email;
use crate::storage::{AttachmentFetcher, BlobStore, OFFICIAL_DOCUMENT_NAME};

/// Organization-wide settings applied to every record.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub organization_name: String,
    pub department_name: Option<String>,
    pub prefix: String,
    pub stamp_position: StampPosition,
    pub stamp_all_pages: bool,
    /// Base of the public tracking page; the stamp QR code points at
    /// `{base}/{registrationNumber}`.
    pub tracking_base_url: Option<String>,
    /// Upper bound on each blob store or fetch call.
    pub external_timeout: Duration,
    /// Age after which a claim that never produced a record is taken over.
    pub claim_lease: Duration,
}

impl RegistrySettings {
    fn tracking_url(&self, registration_number: &str) -> Option<String> {
        self.tracking_base_url
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), registration_number))
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum IngestOutcome {
    #[serde(rename_all = "camelCase")]
    Created {
        record_id: String,
        registration_number: String,
        /// Attachments that could not be stored.
        errors: Vec<String>,
    },
    Duplicate,
    /// Another intake holds a live claim on the message. Left unseen so a
    /// later poll settles it as a duplicate or registers it.
    InProgress,
    Spam,
}

/// Totals for a batch of inbound messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub processed: usize,
    pub skipped_duplicate: usize,
    pub in_progress: usize,
    pub spam_filtered: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Result of producing a record's official document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAttachmentsReport {
    pub success: bool,
    pub processed: usize,
    pub total: usize,
    pub official_document: Option<OfficialDocument>,
    pub errors: Vec<String>,
}

impl ProcessAttachmentsReport {
    fn failure(total: usize, errors: Vec<String>) -> Self {
        Self {
            success: false,
            total,
            errors,
            ..Default::default()
        }
    }
}

pub struct RegistryService {
    db: Database,
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn AttachmentFetcher>,
    numbers: RegistrationNumberGenerator,
    pipeline: DocumentPipeline,
    settings: RegistrySettings,
}

impl RegistryService {
    pub fn new(
        db: Database,
        store: Arc<dyn BlobStore>,
        fetcher: Arc<dyn AttachmentFetcher>,
        numbers: RegistrationNumberGenerator,
        settings: RegistrySettings,
    ) -> Self {
        let pipeline = DocumentPipeline::new(Arc::clone(&store), settings.external_timeout);
        Self {
            db,
            store,
            fetcher,
            numbers,
            pipeline,
            settings,
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Registers one inbound message.
    pub async fn ingest(&self, email: IncomingEmail) -> Result<IngestOutcome, RegistryError> {
        let span = info_span!("ingest",
            uid = email.uid,
            sender = %redact_email(&email.sender_email),
            attachments = email.attachments.len(),
        );
        self.ingest_inner(email).instrument(span).await
    }

    async fn ingest_inner(&self, email: IncomingEmail) -> Result<IngestOutcome, RegistryError> {
        validate(&email)?;

        if is_spam(&email.subject, &email.body) {
            info!("Message classified as spam");
            return Ok(IngestOutcome::Spam);
        }

        let message_id = email
            .message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if let Some(id) = &message_id {
            if is_duplicate(&self.db, id)? {
                debug!(message_id = %id, "Duplicate message");
                return Ok(IngestOutcome::Duplicate);
            }
            if !claim_repo::try_claim(&self.db, id, self.settings.claim_lease)? {
                debug!(message_id = %id, "Message claimed by another intake");
                return Ok(IngestOutcome::InProgress);
            }
        }

        match self.register(&email, message_id.as_deref()).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if let Some(id) = &message_id {
                    if let Err(release_err) = claim_repo::release(&self.db, id) {
                        error!(message_id = %id, error = %release_err, "Failed to release claim");
                    }
                }
                Err(e)
            }
        }
    }

    async fn register(
        &self,
        email: &IncomingEmail,
        message_id: Option<&str>,
    ) -> Result<IngestOutcome, RegistryError> {
        let registration_number = self.numbers.generate().await?;

        let uploads = upload_attachments(
            self.store.as_ref(),
            &registration_number,
            &email.attachments,
            self.settings.external_timeout,
        )
        .await;

        let now = Utc::now();
        let priority = Priority::Normal;
        let record = RegistryRecord {
            id: Uuid::new_v4().to_string(),
            registration_number: registration_number.clone(),
            message_id: message_id.map(str::to_string),
            sender_email: email.sender_email.trim().to_string(),
            sender_name: email.sender_name.clone(),
            recipient: email.to.clone(),
            subject: email.subject.clone(),
            body: email.body.clone(),
            body_html: email.body_html.clone(),
            date_received: email.date,
            status: RecordStatus::Nou,
            priority,
            department_id: None,
            department_name: None,
            assigned_to_user_id: None,
            assigned_to_user_name: None,
            deadline: Some(priority.deadline_from(email.date)),
            notes: None,
            attachments: uploads.stored,
            official_document: None,
            created_at: now,
            updated_at: now,
        };

        registry_repo::insert(&self.db, &record)?;
        if let Some(id) = message_id {
            claim_repo::attach_record(&self.db, id, &record.id)?;
        }

        info!(
            record_id = %record.id,
            registration_number = %registration_number,
            stored = record.attachments.len(),
            failed_uploads = uploads.errors.len(),
            "Registered message"
        );

        Ok(IngestOutcome::Created {
            record_id: record.id,
            registration_number,
            errors: uploads.errors,
        })
    }

    /// Registers messages in order. Returns the report plus the UIDs that
    /// may be marked seen.
    async fn ingest_all(&self, emails: Vec<IncomingEmail>) -> (IngestReport, Vec<u32>) {
        let mut report = IngestReport::default();
        let mut settled = Vec::new();

        for email in emails {
            let uid = email.uid;
            let label = describe(&email);
            match self.ingest(email).await {
                Ok(IngestOutcome::Created { .. }) => {
                    report.processed += 1;
                    settled.push(uid);
                }
                Ok(IngestOutcome::Duplicate) => {
                    report.skipped_duplicate += 1;
                    settled.push(uid);
                }
                Ok(IngestOutcome::InProgress) => report.in_progress += 1,
                Ok(IngestOutcome::Spam) => {
                    report.spam_filtered += 1;
                    settled.push(uid);
                }
                Err(e) => {
                    warn!(uid, error = %e, "Failed to register message");
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", label, e));
                }
            }
        }

        (report, settled)
    }

    pub async fn ingest_batch(&self, emails: Vec<IncomingEmail>) -> IngestReport {
        self.ingest_all(emails).await.0
    }

    /// Fetches unread messages and registers them. Failed messages stay
    /// unseen so the next poll picks them up again.
    pub async fn poll_mailbox(&self, mailbox: &mut dyn Mailbox) -> Result<IngestReport, RegistryError> {
        let limit = self.settings.external_timeout;
        with_timeout(limit, "mailbox connect", mailbox.connect()).await?;

        let emails = match with_timeout(limit, "mailbox fetch", mailbox.fetch_new_emails()).await {
            Ok(emails) => emails,
            Err(e) => {
                close(mailbox, limit).await;
                return Err(e);
            }
        };
        info!(count = emails.len(), "Fetched unread messages");

        let (mut report, settled) = self.ingest_all(emails).await;

        for uid in settled {
            if let Err(e) = with_timeout(limit, "mailbox mark seen", mailbox.mark_seen(uid)).await {
                warn!(uid, error = %e, "Failed to mark message seen");
                report.errors.push(format!("uid {}: {}", uid, e));
            }
        }

        close(mailbox, limit).await;

        info!(
            processed = report.processed,
            duplicates = report.skipped_duplicate,
            in_progress = report.in_progress,
            spam = report.spam_filtered,
            failed = report.failed,
            "Mailbox poll complete"
        );
        Ok(report)
    }

    /// Converts, stamps and merges a record's originals into its official
    /// document. The record is only updated when the run succeeds.
    pub async fn process_attachments(&self, record_id: &str) -> ProcessAttachmentsReport {
        let span = info_span!("process_attachments", record_id = %record_id);
        self.process_inner(record_id).instrument(span).await
    }

    async fn process_inner(&self, record_id: &str) -> ProcessAttachmentsReport {
        let record = match registry_repo::find_by_id(&self.db, record_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return ProcessAttachmentsReport::failure(
                    0,
                    vec![RegistryError::NotFound(record_id.to_string()).to_string()],
                )
            }
            Err(e) => return ProcessAttachmentsReport::failure(0, vec![e.to_string()]),
        };

        let total = record.attachments.len();
        if total == 0 {
            debug!("Record has no attachments");
            return ProcessAttachmentsReport {
                success: true,
                ..Default::default()
            };
        }

        let mut errors = Vec::new();
        let mut files = Vec::with_capacity(total);
        for attachment in &record.attachments {
            let fetched = with_timeout(
                self.settings.external_timeout,
                "attachment fetch",
                self.fetcher.fetch(&attachment.download_url),
            )
            .await;
            match fetched {
                Ok(bytes) => files.push(SourceFile::new(
                    attachment.filename.clone(),
                    Some(attachment.content_type.clone()),
                    bytes,
                )),
                Err(e) => {
                    warn!(filename = %attachment.filename, error = %e, "Attachment fetch failed");
                    errors.push(format!("{}: {}", attachment.filename, e));
                }
            }
        }

        if files.is_empty() {
            errors.push("No attachment could be fetched".to_string());
            return ProcessAttachmentsReport::failure(total, errors);
        }

        let options = self.process_options(&record);
        let outcome = self.pipeline.process_and_merge(files, &options).await;
        errors.extend(outcome.file_errors.iter().cloned());

        if !outcome.success {
            if let Some(e) = outcome.error {
                errors.push(e);
            }
            return ProcessAttachmentsReport::failure(total, errors);
        }

        let (Some(storage_path), Some(download_url)) = (outcome.storage_path, outcome.download_url)
        else {
            errors.push("Official document was not stored".to_string());
            return ProcessAttachmentsReport::failure(total, errors);
        };

        let now = Utc::now();
        let document = OfficialDocument {
            file_name: OFFICIAL_DOCUMENT_NAME.to_string(),
            storage_path,
            download_url,
            page_count: outcome.page_count.unwrap_or(0),
            file_size: outcome.file_size.unwrap_or(0),
            source_file_count: outcome.source_file_count,
            processed_at: now,
        };

        match registry_repo::set_official_document(&self.db, record_id, &document, &now.to_rfc3339()) {
            Ok(true) => {}
            Ok(false) => {
                errors.push(RegistryError::NotFound(record_id.to_string()).to_string());
                return ProcessAttachmentsReport::failure(total, errors);
            }
            Err(e) => {
                errors.push(e.to_string());
                return ProcessAttachmentsReport::failure(total, errors);
            }
        }

        info!(
            pages = document.page_count,
            merged = document.source_file_count,
            total,
            "Official document attached"
        );

        ProcessAttachmentsReport {
            success: true,
            processed: document.source_file_count,
            total,
            official_document: Some(document),
            errors,
        }
    }

    fn process_options(&self, record: &RegistryRecord) -> ProcessOptions {
        ProcessOptions {
            registration_number: record.registration_number.clone(),
            date_received: record.date_received,
            organization_name: self.settings.organization_name.clone(),
            department_name: self.settings.department_name.clone(),
            sender_name: record.sender_display().to_string(),
            sender_email: record.sender_email.clone(),
            tracking_url: self.settings.tracking_url(&record.registration_number),
            stamp_position: self.settings.stamp_position,
            stamp_all_pages: self.settings.stamp_all_pages,
            upload_to_storage: true,
        }
    }

    /// Sets the workflow fields. Any status may follow any other.
    pub async fn update_status(
        &self,
        record_id: &str,
        status: RecordStatus,
        notes: Option<String>,
        assignment: Option<Assignment>,
    ) -> Result<RegistryRecord, RegistryError> {
        let mut record = registry_repo::find_by_id(&self.db, record_id)?
            .ok_or_else(|| RegistryError::NotFound(record_id.to_string()))?;

        let previous = record.status;
        record.status = status;
        if notes.is_some() {
            record.notes = notes;
        }
        if let Some(assignment) = assignment {
            assignment.apply_to(&mut record);
        }
        record.updated_at = Utc::now();

        if !registry_repo::update_workflow(&self.db, &record)? {
            return Err(RegistryError::NotFound(record_id.to_string()));
        }

        info!(
            record_id = %record.id,
            from = %previous,
            to = %record.status,
            "Record status updated"
        );
        Ok(record)
    }

    /// Removes the record and its claim. Stored blobs are left in place.
    pub async fn delete(&self, record_id: &str) -> Result<(), RegistryError> {
        let record = registry_repo::find_by_id(&self.db, record_id)?
            .ok_or_else(|| RegistryError::NotFound(record_id.to_string()))?;

        registry_repo::delete(&self.db, record_id)?;
        claim_repo::release_for_record(&self.db, record_id)?;

        warn!(
            record_id = %record_id,
            prefix = %format!("registratura/{}/", record.registration_number),
            "Record deleted; stored blobs are orphaned"
        );
        Ok(())
    }

    pub async fn get(&self, record_id: &str) -> Result<RegistryRecord, RegistryError> {
        registry_repo::find_by_id(&self.db, record_id)?
            .ok_or_else(|| RegistryError::NotFound(record_id.to_string()))
    }

    /// Records newest first, with the total matching the filter.
    pub async fn list(&self, filter: &RecordFilter) -> Result<(Vec<RegistryRecord>, u64), RegistryError> {
        Ok(registry_repo::query(&self.db, filter)?)
    }
}

fn validate(email: &IncomingEmail) -> Result<(), RegistryError> {
    let sender = email.sender_email.trim();
    if sender.is_empty() {
        return Err(RegistryError::Validation("missing sender address".to_string()));
    }
    if !sender.contains('@') {
        return Err(RegistryError::Validation(format!(
            "malformed sender address '{}'",
            redact_email(sender)
        )));
    }
    Ok(())
}

async fn close(mailbox: &mut dyn Mailbox, limit: Duration) {
    if let Err(e) = with_timeout(limit, "mailbox disconnect", mailbox.disconnect()).await {
        warn!(error = %e, "Mailbox disconnect failed");
    }
}

fn describe(email: &IncomingEmail) -> String {
    match email.message_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => format!("uid {}", email.uid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::storage::{LocalBlobStore, UrlFetcher};
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> (RegistryService, Database) {
        let db = Database::open_in_memory().unwrap();
        let store: Arc<dyn BlobStore> =
            Arc::new(LocalBlobStore::new(dir.path(), "http://blobs.local"));
        let fetcher = Arc::new(UrlFetcher::new(Arc::clone(&store), Duration::from_secs(5)).unwrap());
        let numbers = RegistrationNumberGenerator::new(
            db.clone(),
            "REG",
            RetryPolicy::new(3, Duration::from_millis(1)),
        );
        let settings = RegistrySettings {
            organization_name: "Primăria Test".to_string(),
            department_name: None,
            prefix: "REG".to_string(),
            stamp_position: StampPosition::default(),
            stamp_all_pages: false,
            tracking_base_url: Some("https://primaria.test/urmarire/".to_string()),
            external_timeout: Duration::from_secs(5),
            claim_lease: Duration::from_secs(600),
        };
        (
            RegistryService::new(db.clone(), store, fetcher, numbers, settings),
            db,
        )
    }

    fn message(uid: u32, id: &str) -> IncomingEmail {
        IncomingEmail::new(uid, "ion@example.ro", "Cerere adeverinta", "Va rog.").with_message_id(id)
    }

    #[test]
    fn test_tracking_url_joins_cleanly() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        assert_eq!(
            svc.settings().tracking_url("REG-2026-000001").as_deref(),
            Some("https://primaria.test/urmarire/REG-2026-000001")
        );
    }

    #[tokio::test]
    async fn test_missing_sender_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let (svc, db) = service(&dir);
        let mut email = message(1, "<a@x>");
        email.sender_email = "  ".to_string();

        assert!(matches!(svc.ingest(email).await, Err(RegistryError::Validation(_))));
        assert!(!claim_repo::is_claimed(&db, "<a@x>").unwrap());
        let year = chrono::Datelike::year(&Utc::now());
        assert!(crate::db::counter_repo::find(&db, year).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ingest_creates_record_with_defaults() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        let email = message(1, "<a@x>");
        let received = email.date;

        let IngestOutcome::Created { record_id, registration_number, errors } =
            svc.ingest(email).await.unwrap()
        else {
            panic!("expected a created record");
        };
        assert!(errors.is_empty());

        let record = svc.get(&record_id).await.unwrap();
        assert_eq!(record.registration_number, registration_number);
        assert_eq!(record.status, RecordStatus::Nou);
        assert_eq!(record.priority, Priority::Normal);
        assert_eq!(record.deadline, Some(Priority::Normal.deadline_from(received)));
        assert_eq!(record.message_id.as_deref(), Some("<a@x>"));
    }

    #[tokio::test]
    async fn test_second_copy_is_duplicate() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        assert!(matches!(svc.ingest(message(1, "<a@x>")).await.unwrap(), IngestOutcome::Created { .. }));
        assert_eq!(svc.ingest(message(2, "<a@x>")).await.unwrap(), IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_live_foreign_claim_is_in_progress() {
        let dir = TempDir::new().unwrap();
        let (svc, db) = service(&dir);
        claim_repo::try_claim(&db, "<a@x>", Duration::from_secs(600)).unwrap();

        assert_eq!(svc.ingest(message(1, "<a@x>")).await.unwrap(), IngestOutcome::InProgress);
        let report = svc.ingest_batch(vec![message(2, "<a@x>")]).await;
        assert_eq!(report.in_progress, 1);
        assert_eq!(report.skipped_duplicate, 0);
    }

    #[tokio::test]
    async fn test_orphaned_claim_is_recovered_after_lease() {
        let dir = TempDir::new().unwrap();
        let (svc, db) = service(&dir);
        // An intake that died after claiming, before writing its record.
        claim_repo::try_claim(&db, "<lost@x>", Duration::from_secs(600)).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE message_claims SET claimed_at = ?1 WHERE message_id = '<lost@x>'",
                [(Utc::now() - chrono::Duration::hours(1)).to_rfc3339()],
            )?;
            Ok(())
        })
        .unwrap();

        let outcome = svc.ingest(message(1, "<lost@x>")).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Created { .. }));
        let (_, total) = svc.list(&RecordFilter::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(svc.ingest(message(2, "<lost@x>")).await.unwrap(), IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_spam_is_not_registered() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        let email = IncomingEmail::new(1, "x@spam.test", "CASTIGA ACUM!!!", "premiu gratuit bonus");
        assert_eq!(svc.ingest(email).await.unwrap(), IngestOutcome::Spam);
        let (_, total) = svc.list(&RecordFilter::default()).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_update_status_recomputes_deadline_from_receipt() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        let IngestOutcome::Created { record_id, .. } = svc.ingest(message(1, "<a@x>")).await.unwrap()
        else {
            panic!("expected a created record");
        };

        let updated = svc
            .update_status(
                &record_id,
                RecordStatus::InLucru,
                Some("Preluat".to_string()),
                Some(Assignment {
                    department_id: Some("urb".to_string()),
                    department_name: Some("Urbanism".to_string()),
                    assigned_to_user_id: Some("u7".to_string()),
                    assigned_to_user_name: Some("Maria Ionescu".to_string()),
                    priority: Some(Priority::Urgent),
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, RecordStatus::InLucru);
        assert_eq!(updated.deadline, Some(Priority::Urgent.deadline_from(updated.date_received)));

        // Backwards transitions are allowed.
        let reverted = svc.update_status(&record_id, RecordStatus::Nou, None, None).await.unwrap();
        assert_eq!(reverted.status, RecordStatus::Nou);
        assert_eq!(reverted.notes.as_deref(), Some("Preluat"));
        assert_eq!(reverted.department_id.as_deref(), Some("urb"));
        assert_eq!(reverted.department_name.as_deref(), Some("Urbanism"));
        assert_eq!(reverted.assigned_to_user_id.as_deref(), Some("u7"));
        assert_eq!(reverted.assigned_to_user_name.as_deref(), Some("Maria Ionescu"));
    }

    #[tokio::test]
    async fn test_update_status_missing_record() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        assert!(matches!(
            svc.update_status("nope", RecordStatus::Rezolvat, None, None).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_releases_claim() {
        let dir = TempDir::new().unwrap();
        let (svc, db) = service(&dir);
        let IngestOutcome::Created { record_id, .. } = svc.ingest(message(1, "<a@x>")).await.unwrap()
        else {
            panic!("expected a created record");
        };

        svc.delete(&record_id).await.unwrap();
        assert!(!claim_repo::is_claimed(&db, "<a@x>").unwrap());
        assert!(matches!(svc.get(&record_id).await, Err(RegistryError::NotFound(_))));
        // The same message can now be registered again.
        assert!(matches!(svc.ingest(message(2, "<a@x>")).await.unwrap(), IngestOutcome::Created { .. }));
    }

    #[tokio::test]
    async fn test_process_without_attachments_succeeds_empty() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        let IngestOutcome::Created { record_id, .. } = svc.ingest(message(1, "<a@x>")).await.unwrap()
        else {
            panic!("expected a created record");
        };

        let report = svc.process_attachments(&record_id).await;
        assert!(report.success);
        assert_eq!(report.processed, 0);
        assert_eq!(report.total, 0);
        assert!(report.official_document.is_none());
    }

    #[tokio::test]
    async fn test_process_missing_record_fails() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir);
        let report = svc.process_attachments("missing").await;
        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
    }
}
