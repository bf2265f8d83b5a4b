use std::sync::Arc;
use std::time::Duration;

use lopdf::Document;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{ProcessError, StorageError};
use crate::processor::merge::MergedPdf;
use crate::processor::{apply_stamp, merge_documents, ConverterRegistry, SourceFile};
use crate::storage::{official_document_path, BlobStore};

use super::error::PipelineError;
use super::options::{MergeOutcome, ProcessOptions};

/// Converts, stamps and merges a record's files into its official PDF.
pub struct DocumentPipeline {
    converters: Arc<ConverterRegistry>,
    store: Arc<dyn BlobStore>,
    upload_timeout: Duration,
}

struct Prepared {
    merged: MergedPdf,
    source_file_count: usize,
    file_errors: Vec<String>,
}

impl DocumentPipeline {
    pub fn new(store: Arc<dyn BlobStore>, upload_timeout: Duration) -> Self {
        Self {
            converters: Arc::new(ConverterRegistry::new()),
            store,
            upload_timeout,
        }
    }

    /// Runs the full normalization for one record. Never returns an error:
    /// failures are reported in the outcome.
    pub async fn process_and_merge(
        &self,
        files: Vec<SourceFile>,
        options: &ProcessOptions,
    ) -> MergeOutcome {
        let span = info_span!("process_and_merge",
            registration_number = %options.registration_number,
            files = files.len(),
        );

        async move {
            let total = files.len();
            let prepared = match self.prepare(files, options).await {
                Ok(p) => p,
                Err((e, file_errors)) => {
                    warn!(error = %e, "Normalization failed");
                    return MergeOutcome::failure(e.to_string(), file_errors);
                }
            };

            let Prepared {
                merged,
                source_file_count,
                file_errors,
            } = prepared;
            let file_size = merged.bytes.len() as u64;

            let mut outcome = MergeOutcome {
                success: true,
                file_size: Some(file_size),
                page_count: Some(merged.page_count),
                source_file_count,
                file_errors,
                ..Default::default()
            };

            if options.upload_to_storage {
                match self
                    .upload(&options.registration_number, &merged.bytes)
                    .instrument(info_span!("upload_official"))
                    .await
                {
                    Ok((path, url)) => {
                        outcome.storage_path = Some(path);
                        outcome.download_url = Some(url);
                    }
                    Err(e) => {
                        warn!(error = %e, "Official document upload failed");
                        return MergeOutcome::failure(e.to_string(), outcome.file_errors);
                    }
                }
            } else {
                outcome.pdf_bytes = Some(merged.bytes);
            }

            info!(
                page_count = merged.page_count,
                file_size,
                merged_files = source_file_count,
                skipped_files = total - source_file_count,
                "Official document produced"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn prepare(
        &self,
        files: Vec<SourceFile>,
        options: &ProcessOptions,
    ) -> Result<Prepared, (PipelineError, Vec<String>)> {
        let converters = Arc::clone(&self.converters);
        let options = options.clone();

        // Conversion and merging are CPU-bound.
        tokio::task::spawn_blocking(move || prepare_blocking(&converters, &files, &options))
            .await
            .map_err(|e| (PipelineError::TaskAborted(e.to_string()), Vec::new()))?
    }

    async fn upload(
        &self,
        registration_number: &str,
        bytes: &[u8],
    ) -> Result<(String, String), PipelineError> {
        let path = official_document_path(registration_number);
        let seconds = self.upload_timeout.as_secs();

        let blob = tokio::time::timeout(
            self.upload_timeout,
            self.store.upload(&path, bytes, Some("application/pdf")),
        )
        .await
        .map_err(|_| StorageError::Timeout {
            operation: "official document upload".to_string(),
            seconds,
        })??;

        let url = tokio::time::timeout(self.upload_timeout, self.store.download_url(&blob))
            .await
            .map_err(|_| StorageError::Timeout {
                operation: "official document url".to_string(),
                seconds,
            })??;

        Ok((blob.path, url))
    }
}

/// Converts and stamps a single file.
fn normalize_file(
    converters: &ConverterRegistry,
    file: &SourceFile,
    options: &ProcessOptions,
) -> Result<Document, ProcessError> {
    let (format, mut doc) = converters.convert_document(file)?;
    debug!(filename = %file.filename, format = %format, "Converted to PDF");

    apply_stamp(
        &mut doc,
        &options.stamp_content(),
        options.stamp_position,
        options.stamp_all_pages,
    )?;
    Ok(doc)
}

fn prepare_blocking(
    converters: &ConverterRegistry,
    files: &[SourceFile],
    options: &ProcessOptions,
) -> Result<Prepared, (PipelineError, Vec<String>)> {
    let mut documents = Vec::with_capacity(files.len());
    let mut file_errors = Vec::new();

    for file in files {
        let _step = info_span!("normalize_file", filename = %file.filename).entered();
        match normalize_file(converters, file, options) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "Skipping file");
                file_errors.push(format!("{}: {}", file.filename, e));
            }
        }
    }

    if documents.is_empty() {
        return Err((PipelineError::NothingProcessed, file_errors));
    }

    let source_file_count = documents.len();
    let merged = {
        let _step = info_span!("merge").entered();
        match merge_documents(documents) {
            Ok(m) => m,
            Err(e) => return Err((PipelineError::Processing(e), file_errors)),
        }
    };

    Ok(Prepared {
        merged,
        source_file_count,
        file_errors,
    })
}
