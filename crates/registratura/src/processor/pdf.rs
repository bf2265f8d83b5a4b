use lopdf::Document;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, PdfConverter, SourceFile};

/// PDFs are passed through untouched once they are known to load.
pub struct PdfPassthrough;

impl PdfPassthrough {
    /// Loads the PDF once, rejecting encrypted and pageless documents.
    fn load_checked(file: &SourceFile) -> Result<Document, ProcessError> {
        let _span = tracing::info_span!("processor.pdf", filename = %file.filename).entered();

        let doc = Document::load_mem(&file.bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        if doc.is_encrypted() || doc.was_encrypted() {
            return Err(ProcessError::PdfProcessing(
                "Encrypted PDFs cannot be merged".to_string(),
            ));
        }

        if doc.get_pages().is_empty() {
            return Err(ProcessError::PdfProcessing("PDF has no pages".to_string()));
        }

        Ok(doc)
    }
}

impl PdfConverter for PdfPassthrough {
    fn to_pdf(&self, file: &SourceFile) -> Result<Vec<u8>, ProcessError> {
        Self::load_checked(file)?;
        Ok(file.bytes.clone())
    }

    fn to_document(&self, file: &SourceFile) -> Result<Document, ProcessError> {
        Self::load_checked(file)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}
