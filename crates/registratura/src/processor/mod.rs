//! Conversion of heterogeneous attachments into PDF.

pub mod docx;
pub mod image;
pub mod merge;
pub mod pdf;
pub mod stamp;
pub mod text;

pub use merge::merge_documents;
pub use stamp::{apply_stamp, StampContent, StampPosition};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

/// A4 portrait, in PDF points.
pub const A4_WIDTH: f64 = 595.0;
pub const A4_HEIGHT: f64 = 842.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Image,
    Docx,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "webp" => {
                Some(DocumentFormat::Image)
            }
            "docx" => Some(DocumentFormat::Docx),
            "txt" | "text" | "md" | "csv" | "log" => Some(DocumentFormat::Text),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match mime.as_str() {
            "application/pdf" | "application/x-pdf" => Some(DocumentFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            m if m.starts_with("image/") => Some(DocumentFormat::Image),
            m if m.starts_with("text/") => Some(DocumentFormat::Text),
            _ => None,
        }
    }

    /// Determines the format from the content itself first, then the
    /// declared content type, then the filename extension.
    ///
    /// Generic containers (a bare ZIP, `application/octet-stream`) defer to
    /// the later hints.
    pub fn detect(bytes: &[u8], declared_mime: Option<&str>, filename: &str) -> Option<Self> {
        let sniffed = infer::get(bytes).and_then(|kind| Self::from_mime(kind.mime_type()));
        sniffed
            .or_else(|| declared_mime.and_then(Self::from_mime))
            .or_else(|| {
                std::path::Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(Self::from_extension)
            })
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Image => "image",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Text => "text",
        };
        f.write_str(name)
    }
}

/// An input file for conversion, held in memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes,
        }
    }
}

pub trait PdfConverter: Send + Sync {
    fn to_pdf(&self, file: &SourceFile) -> Result<Vec<u8>, ProcessError>;

    /// The converted file as a loaded document, ready for stamping.
    fn to_document(&self, file: &SourceFile) -> Result<Document, ProcessError> {
        let pdf = self.to_pdf(file)?;
        Document::load_mem(&pdf)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to reload PDF: {}", e)))
    }

    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ConverterRegistry {
    converters: Vec<Box<dyn PdfConverter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            converters: vec![
                Box::new(pdf::PdfPassthrough),
                Box::new(image::ImageConverter),
                Box::new(docx::DocxConverter),
                Box::new(text::TextConverter),
            ],
        }
    }

    fn converter_for(
        &self,
        file: &SourceFile,
    ) -> Result<(DocumentFormat, &dyn PdfConverter), ProcessError> {
        let format = DocumentFormat::detect(&file.bytes, file.content_type.as_deref(), &file.filename)
            .ok_or_else(|| {
                ProcessError::UnsupportedFormat(
                    file.content_type
                        .clone()
                        .unwrap_or_else(|| file.filename.clone()),
                )
            })?;

        self.converters
            .iter()
            .find(|c| c.supports(format))
            .map(|c| (format, c.as_ref()))
            .ok_or_else(|| ProcessError::UnsupportedFormat(format.to_string()))
    }

    /// Converts a file to PDF bytes, reporting the detected format.
    pub fn convert(&self, file: &SourceFile) -> Result<(DocumentFormat, Vec<u8>), ProcessError> {
        let (format, converter) = self.converter_for(file)?;
        converter.to_pdf(file).map(|pdf| (format, pdf))
    }

    /// Converts a file to a loaded document, reporting the detected format.
    pub fn convert_document(
        &self,
        file: &SourceFile,
    ) -> Result<(DocumentFormat, Document), ProcessError> {
        let (format, converter) = self.converter_for(file)?;
        converter.to_document(file).map(|doc| (format, doc))
    }
}

/// Escapes text for a PDF literal string. Romanian diacritics are
/// transliterated since the standard Type1 fonts only cover Latin-1;
/// anything else non-ASCII becomes `?`.
pub fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            'ă' | 'â' | 'á' | 'à' | 'ä' => out.push('a'),
            'Ă' | 'Â' | 'Á' | 'À' | 'Ä' => out.push('A'),
            'î' | 'í' => out.push('i'),
            'Î' | 'Í' => out.push('I'),
            'ș' | 'ş' => out.push('s'),
            'Ș' | 'Ş' => out.push('S'),
            'ț' | 'ţ' => out.push('t'),
            'Ț' | 'Ţ' => out.push('T'),
            'é' | 'è' | 'ë' => out.push('e'),
            'ö' | 'ó' => out.push('o'),
            'ü' | 'ú' => out.push('u'),
            '\t' => out.push_str("    "),
            c if c.is_ascii() && !c.is_control() => out.push(c),
            c if c.is_control() => {}
            _ => out.push('?'),
        }
    }
    out
}

/// Adds a `Pages` node and `Catalog` for `page_ids` (already inserted with
/// `Parent` = `pages_id`) and serializes the document.
pub(crate) fn finish_document(
    mut doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
) -> Result<Vec<u8>, ProcessError> {
    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ProcessError::PdfProcessing(e.to_string()))?;
    Ok(buffer)
}

/// Walks up the page tree looking for `key`, returning the first value
/// found on the page itself or an ancestor `Pages` node.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Bounded to survive malformed Parent cycles.
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Resolves an object that may be a reference to a dictionary and returns an
/// owned copy.
pub(crate) fn resolve_dictionary(doc: &Document, object: &Object) -> Option<Dictionary> {
    match doc.dereference(object) {
        Ok((_, Object::Dictionary(dict))) => Some(dict.clone()),
        _ => None,
    }
}

/// The page's visible box as `[llx, lly, urx, ury]`, falling back to A4.
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let resolved = inherited_attribute(doc, page_id, b"CropBox")
        .or_else(|| inherited_attribute(doc, page_id, b"MediaBox"))
        .and_then(|obj| doc.dereference(&obj).ok().map(|(_, o)| o.clone()));

    if let Some(Object::Array(values)) = resolved {
        let nums: Vec<f64> = values
            .iter()
            .filter_map(|v| v.as_float().ok().map(f64::from))
            .collect();
        if nums.len() == 4 {
            return [
                nums[0].min(nums[2]),
                nums[1].min(nums[3]),
                nums[0].max(nums[2]),
                nums[1].max(nums[3]),
            ];
        }
    }
    [0.0, 0.0, A4_WIDTH, A4_HEIGHT]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("jpeg"), Some(DocumentFormat::Image));
        assert_eq!(DocumentFormat::from_extension("docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("doc"), None);
    }

    #[test]
    fn test_format_from_mime_ignores_parameters() {
        assert_eq!(
            DocumentFormat::from_mime("text/plain; charset=utf-8"),
            Some(DocumentFormat::Text)
        );
        assert_eq!(DocumentFormat::from_mime("image/png"), Some(DocumentFormat::Image));
        assert_eq!(DocumentFormat::from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_detect_prefers_content_over_declared_type() {
        let pdf = b"%PDF-1.4\n%fake";
        assert_eq!(
            DocumentFormat::detect(pdf, Some("application/octet-stream"), "scan.bin"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::detect(pdf, Some("image/png"), "scan.png"),
            Some(DocumentFormat::Pdf)
        );
    }

    #[test]
    fn test_detect_falls_back_to_declared_then_extension() {
        assert_eq!(
            DocumentFormat::detect(b"plain words", Some("text/plain"), "x.bin"),
            Some(DocumentFormat::Text)
        );
        assert_eq!(
            DocumentFormat::detect(b"plain words", None, "notes.txt"),
            Some(DocumentFormat::Text)
        );
        assert_eq!(DocumentFormat::detect(b"plain words", None, "archive.xyz"), None);
    }

    #[test]
    fn test_unsupported_format_error() {
        let registry = ConverterRegistry::new();
        let file = SourceFile::new("data.xyz", None, b"\x00\x01\x02".to_vec());
        match registry.convert(&file) {
            Err(ProcessError::UnsupportedFormat(name)) => assert_eq!(name, "data.xyz"),
            other => panic!("Expected UnsupportedFormat, got {:?}", other.map(|r| r.0)),
        }
    }

    #[test]
    fn test_registry_routes_text() {
        let registry = ConverterRegistry::new();
        let file = SourceFile::new("nota.txt", Some("text/plain".to_string()), b"Salut".to_vec());
        let (format, pdf) = registry.convert(&file).unwrap();
        assert_eq!(format, DocumentFormat::Text);
        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(escape_pdf_string("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_pdf_string("Cerere înregistrată"), "Cerere inregistrata");
        assert_eq!(escape_pdf_string("Ștefan Țuțea"), "Stefan Tutea");
        assert_eq!(escape_pdf_string("€"), "?");
    }
}
