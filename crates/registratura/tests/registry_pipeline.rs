//! Intake-to-official-document flows through the registry service.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Datelike, Utc};
use futures_util::future::join_all;
use lopdf::Document;

use common::{
    corrupt_pdf_fixture, docx_fixture, jpeg_fixture, pdf_fixture, png_fixture, FakeMailbox,
    MessageBuilder, TestHarness,
};
use registratura::db::{claim_repo, counter_repo};
use registratura::registry::{
    IngestOutcome, Priority, RecordStatus, RegistrationNumberGenerator,
};
use registratura::retry::RetryPolicy;
use registratura::storage::{AttachmentFetcher, BlobStore, UrlFetcher};

fn is_registration_number(value: &str, year: i32) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    parts.len() == 3
        && parts[0] == "REG"
        && parts[1] == format!("{:04}", year)
        && parts[2].len() == 6
        && parts[2].chars().all(|c| c.is_ascii_digit())
}

/// Page sizes of a PDF in page order, as (width, height).
fn page_sizes(bytes: &[u8]) -> Vec<(f32, f32)> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let x0 = media_box[0].as_float().unwrap();
            let y0 = media_box[1].as_float().unwrap();
            let x1 = media_box[2].as_float().unwrap();
            let y1 = media_box[3].as_float().unwrap();
            (x1 - x0, y1 - y0)
        })
        .collect()
}

#[tokio::test]
async fn ingest_issues_unique_well_formed_numbers() {
    let harness = TestHarness::new();
    let year = Utc::now().year();

    let mut numbers = HashSet::new();
    for uid in 1..=5 {
        let (record_id, number) = harness
            .ingest_created(MessageBuilder::new(uid).build())
            .await;
        assert!(is_registration_number(&number, year), "bad number {}", number);
        assert!(numbers.insert(number.clone()));

        let record = harness.registry.get(&record_id).await.unwrap();
        assert_eq!(record.registration_number, number);
        assert_eq!(record.status, RecordStatus::Nou);
        assert_eq!(record.priority, Priority::Normal);
        assert_eq!(
            record.deadline,
            Some(Priority::Normal.deadline_from(record.date_received))
        );
    }
    assert!(numbers.contains(&format!("REG-{}-000005", year)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_copies_of_one_message_register_once() {
    let harness = TestHarness::new();
    let copies: Vec<_> = (0..6)
        .map(|uid| {
            MessageBuilder::new(uid)
                .message_id("<same@example.ro>")
                .attachment("cerere.pdf", "application/pdf", pdf_fixture("cerere", 1, 595, 842))
                .build()
        })
        .collect();

    let outcomes = join_all(copies.into_iter().map(|m| harness.registry.ingest(m))).await;

    let created = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(IngestOutcome::Created { .. })))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(IngestOutcome::Duplicate | IngestOutcome::InProgress)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(skipped, 5);

    // Once settled, any copy still unseen is a plain duplicate.
    let late = MessageBuilder::new(9).message_id("<same@example.ro>").build();
    assert_eq!(harness.registry.ingest(late).await.unwrap(), IngestOutcome::Duplicate);

    let (_, total) = harness.registry.list(&Default::default()).await.unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn attachment_round_trips_through_download_url() {
    let harness = TestHarness::new();
    let original = png_fixture(40, 30);
    let (record_id, number) = harness
        .ingest_created(
            MessageBuilder::new(1)
                .attachment("poză față.png", "image/png", original.clone())
                .build(),
        )
        .await;

    let record = harness.registry.get(&record_id).await.unwrap();
    assert_eq!(record.attachments.len(), 1);
    let attachment = &record.attachments[0];
    assert_eq!(attachment.filename, "poză față.png");
    assert_eq!(
        attachment.storage_path,
        format!("registratura/{}/attachments/poz__fa__.png", number)
    );
    assert_eq!(attachment.content_type, "image/png");
    assert_eq!(attachment.size, original.len() as u64);

    let fetcher = UrlFetcher::new(harness.store.clone(), Duration::from_secs(5)).unwrap();
    let fetched = fetcher.fetch(&attachment.download_url).await.unwrap();
    assert_eq!(fetched, original);
}

#[tokio::test]
async fn merged_document_keeps_attachment_order() {
    let harness = TestHarness::new();
    let (record_id, _) = harness
        .ingest_created(
            MessageBuilder::new(1)
                .attachment("A.pdf", "application/pdf", pdf_fixture("A", 2, 400, 500))
                .attachment("B.jpg", "image/jpeg", jpeg_fixture(200, 100))
                .attachment(
                    "C.docx",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                    docx_fixture(&["Subsemnatul solicit", "eliberarea unui certificat."]),
                )
                .build(),
        )
        .await;

    let report = harness.registry.process_attachments(&record_id).await;
    assert!(report.success, "errors: {:?}", report.errors);
    assert_eq!(report.processed, 3);
    assert_eq!(report.total, 3);

    let official = report.official_document.unwrap();
    assert_eq!(official.page_count, 4);
    assert_eq!(official.source_file_count, 3);

    let bytes = harness.store.download(&official.storage_path).await.unwrap();
    let sizes = page_sizes(&bytes);
    assert_eq!(
        sizes,
        vec![(400.0, 500.0), (400.0, 500.0), (842.0, 595.0), (595.0, 842.0)]
    );
}

#[tokio::test]
async fn corrupt_attachment_is_skipped_and_reported() {
    let harness = TestHarness::new();
    let (record_id, number) = harness
        .ingest_created(
            MessageBuilder::new(1)
                .attachment("cerere.pdf", "application/pdf", pdf_fixture("cerere", 2, 595, 842))
                .attachment("stricat.pdf", "application/pdf", corrupt_pdf_fixture())
                .attachment("schita.png", "image/png", png_fixture(60, 80))
                .build(),
        )
        .await;

    let report = harness.registry.process_attachments(&record_id).await;
    assert!(report.success);
    assert_eq!(report.total, 3);
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("stricat.pdf"));

    let official = report.official_document.clone().unwrap();
    assert_eq!(official.source_file_count, 2);
    assert_eq!(official.page_count, 3);
    assert_eq!(
        official.storage_path,
        format!("registratura/{}/official/document-oficial.pdf", number)
    );

    let record = harness.registry.get(&record_id).await.unwrap();
    assert_eq!(record.official_document, Some(official));
}

#[tokio::test]
async fn reprocessing_is_stable() {
    let harness = TestHarness::with_settings(|s| s.stamp_all_pages = true);
    let (record_id, _) = harness
        .ingest_created(
            MessageBuilder::new(1)
                .attachment("a.pdf", "application/pdf", pdf_fixture("a", 3, 595, 842))
                .attachment("b.png", "image/png", png_fixture(120, 40))
                .build(),
        )
        .await;

    let first = harness.registry.process_attachments(&record_id).await;
    let second = harness.registry.process_attachments(&record_id).await;
    let first = first.official_document.unwrap();
    let second = second.official_document.unwrap();

    assert_eq!(first.page_count, 4);
    assert_eq!(first.page_count, second.page_count);
    assert_eq!(first.storage_path, second.storage_path);
}

#[tokio::test]
async fn failed_normalization_leaves_record_untouched() {
    let harness = TestHarness::new();
    let (record_id, _) = harness
        .ingest_created(
            MessageBuilder::new(1)
                .attachment("stricat.pdf", "application/pdf", corrupt_pdf_fixture())
                .build(),
        )
        .await;
    let before = harness.registry.get(&record_id).await.unwrap();

    let report = harness.registry.process_attachments(&record_id).await;
    assert!(!report.success);
    assert!(report.official_document.is_none());
    assert!(!report.errors.is_empty());

    let after = harness.registry.get(&record_id).await.unwrap();
    assert_eq!(after.official_document, None);
    assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn missing_blob_is_a_per_file_error() {
    let harness = TestHarness::new();
    let (record_id, _) = harness
        .ingest_created(
            MessageBuilder::new(1)
                .attachment("a.pdf", "application/pdf", pdf_fixture("a", 1, 595, 842))
                .attachment("b.pdf", "application/pdf", pdf_fixture("b", 1, 595, 842))
                .build(),
        )
        .await;
    let record = harness.registry.get(&record_id).await.unwrap();
    let lost = harness.blob_root().join(&record.attachments[0].storage_path);
    std::fs::remove_file(lost).unwrap();

    let report = harness.registry.process_attachments(&record_id).await;
    assert!(report.success);
    assert_eq!(report.processed, 1);
    assert_eq!(report.total, 2);
    assert!(report.errors[0].starts_with("a.pdf"));
}

#[tokio::test]
async fn poll_marks_settled_messages_seen_and_leaves_failures() {
    let harness = TestHarness::new();
    let mut mailbox = FakeMailbox::new(vec![
        MessageBuilder::new(1).build(),
        MessageBuilder::new(2)
            .subject("CASTIGA ACUM UN PREMIU!!!")
            .body("oferta gratuita, bonus garantat")
            .build(),
        MessageBuilder::new(3).message_id("<msg-1@example.ro>").build(),
        MessageBuilder::new(4).sender("").build(),
    ]);

    let report = harness.registry.poll_mailbox(&mut mailbox).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.spam_filtered, 1);
    assert_eq!(report.skipped_duplicate, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(mailbox.seen, vec![1, 2, 3]);
    assert!(!mailbox.connected);

    // The failed message is offered again on the next poll.
    let report = harness.registry.poll_mailbox(&mut mailbox).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 0);
    assert_eq!(mailbox.connects, 2);
}

#[tokio::test]
async fn poll_recovers_message_orphaned_by_crashed_intake() {
    let harness = TestHarness::new();
    let message = MessageBuilder::new(7).message_id("<orfan@example.ro>").build();
    let mut mailbox = FakeMailbox::new(vec![message]);
    claim_repo::try_claim(&harness.db, "<orfan@example.ro>", Duration::from_secs(600)).unwrap();

    // Claim still inside its lease: left unseen, nothing registered.
    let report = harness.registry.poll_mailbox(&mut mailbox).await.unwrap();
    assert_eq!(report.in_progress, 1);
    assert!(mailbox.seen.is_empty());

    harness
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE message_claims SET claimed_at = ?1",
                [(Utc::now() - chrono::Duration::hours(2)).to_rfc3339()],
            )?;
            Ok(())
        })
        .unwrap();

    let report = harness.registry.poll_mailbox(&mut mailbox).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(mailbox.seen, vec![7]);
    let (records, _) = harness.registry.list(&Default::default()).await.unwrap();
    assert_eq!(records[0].message_id.as_deref(), Some("<orfan@example.ro>"));
}

#[tokio::test]
async fn poll_surfaces_fetch_failure() {
    let harness = TestHarness::new();
    let mut mailbox = FakeMailbox::new(vec![MessageBuilder::new(1).build()]);
    mailbox.fail_fetch = true;

    let err = harness.registry.poll_mailbox(&mut mailbox).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(mailbox.seen.is_empty());
    assert!(!mailbox.connected);
}

#[tokio::test]
async fn year_rollover_restarts_sequence() {
    let harness = TestHarness::new();
    let numbers = RegistrationNumberGenerator::new(
        harness.db.clone(),
        "REG",
        RetryPolicy::new(3, Duration::from_millis(1)),
    );
    for _ in 0..7 {
        numbers.generate_for_year(2025).await.unwrap();
    }

    assert_eq!(
        numbers.generate_for_year(2026).await.unwrap(),
        "REG-2026-000001"
    );
    assert_eq!(counter_repo::find(&harness.db, 2025).unwrap().unwrap().last_number, 7);
    assert_eq!(counter_repo::find(&harness.db, 2026).unwrap().unwrap().last_number, 1);
}

#[tokio::test]
async fn deleted_record_keeps_its_blobs() {
    let harness = TestHarness::new();
    let (record_id, _) = harness
        .ingest_created(
            MessageBuilder::new(1)
                .attachment("a.pdf", "application/pdf", pdf_fixture("a", 1, 595, 842))
                .build(),
        )
        .await;
    let record = harness.registry.get(&record_id).await.unwrap();

    harness.registry.delete(&record_id).await.unwrap();

    assert!(harness.registry.get(&record_id).await.is_err());
    assert!(harness
        .store
        .exists(&record.attachments[0].storage_path)
        .await
        .unwrap());
}
