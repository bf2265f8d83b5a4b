use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::ProcessError;
use crate::processor::stamp::STAMP_BAND;
use crate::processor::{
    escape_pdf_string, finish_document, DocumentFormat, PdfConverter, SourceFile, A4_HEIGHT,
    A4_WIDTH,
};

pub(crate) const FONT_SIZE: f64 = 10.0;
pub(crate) const LEADING: f64 = 13.0;
pub(crate) const MARGIN: f64 = 50.0;
/// Courier advances 600/1000 em per glyph.
const CHAR_WIDTH: f64 = FONT_SIZE * 0.6;
pub(crate) const WRAP_COLUMNS: usize = ((A4_WIDTH - 2.0 * MARGIN) / CHAR_WIDTH) as usize;
/// Top and bottom margins leave the stamp band free in either corner.
pub(crate) const VERTICAL_MARGIN: f64 = STAMP_BAND;

pub struct TextConverter;

impl PdfConverter for TextConverter {
    fn to_pdf(&self, file: &SourceFile) -> Result<Vec<u8>, ProcessError> {
        let _span = tracing::info_span!("processor.text", filename = %file.filename).entered();
        let text = String::from_utf8_lossy(&file.bytes);
        render_text_pdf(&text)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}

pub(crate) fn lines_per_page() -> usize {
    ((A4_HEIGHT - 2.0 * VERTICAL_MARGIN) / LEADING).floor() as usize
}

/// Breaks a single logical line into display lines of at most
/// `WRAP_COLUMNS` characters, preferring word boundaries.
fn wrap_line(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in line.split(' ') {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if current_len > 0 && current_len + 1 + word_len > WRAP_COLUMNS {
            out.push(std::mem::take(&mut current));
        }

        if word_len > WRAP_COLUMNS {
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(WRAP_COLUMNS) {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                current = chunk.iter().collect();
            }
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    out.push(current);
    out
}

fn page_content(lines: &[String]) -> Vec<u8> {
    let mut content = String::new();
    content.push_str("BT\n");
    content.push_str(&format!("/F1 {} Tf\n", FONT_SIZE));
    content.push_str(&format!("{} {} Td\n", MARGIN, A4_HEIGHT - VERTICAL_MARGIN - FONT_SIZE));
    content.push_str(&format!("{} TL\n", LEADING));
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }
    content.push_str("ET\n");
    content.into_bytes()
}

/// Lays plain text out onto as many A4 pages as needed.
///
/// Empty input still produces one blank page.
pub fn render_text_pdf(text: &str) -> Result<Vec<u8>, ProcessError> {
    let display: Vec<String> = text
        .replace("\r\n", "\n")
        .split('\n')
        .flat_map(wrap_line)
        .collect();

    let per_page = lines_per_page();
    let mut chunks: Vec<&[String]> = display.chunks(per_page).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(chunk)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(A4_WIDTH as f32), Object::Real(A4_HEIGHT as f32)],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    finish_document(doc, pages_id, page_ids)
        .map_err(|e| ProcessError::TextProcessing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).unwrap().get_pages().len()
    }

    #[test]
    fn test_short_text_single_page() {
        let pdf = render_text_pdf("Buna ziua,\nva rog sa aprobati cererea.").unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&pdf), 1);
    }

    #[test]
    fn test_empty_text_still_one_page() {
        let pdf = render_text_pdf("").unwrap();
        assert_eq!(page_count(&pdf), 1);
    }

    #[test]
    fn test_long_text_paginates() {
        let text = (0..150).map(|i| format!("linia {}", i)).collect::<Vec<_>>().join("\n");
        let pdf = render_text_pdf(&text).unwrap();
        let expected = 150_usize.div_ceil(lines_per_page());
        assert_eq!(page_count(&pdf), expected);
        assert!(expected >= 2);
    }

    #[test]
    fn test_wrap_line_respects_width() {
        let long = "cuvant ".repeat(40);
        let wrapped = wrap_line(long.trim_end());
        assert!(wrapped.len() > 1);
        assert!(wrapped.iter().all(|l| l.chars().count() <= WRAP_COLUMNS));
    }

    #[test]
    fn test_full_line_fits_inside_right_margin() {
        assert_eq!(WRAP_COLUMNS, 82);
        assert!(MARGIN + WRAP_COLUMNS as f64 * CHAR_WIDTH <= A4_WIDTH - MARGIN);
    }

    #[test]
    fn test_wrap_line_splits_unbroken_words() {
        let word = "x".repeat(WRAP_COLUMNS * 2 + 5);
        let wrapped = wrap_line(&word);
        assert_eq!(wrapped.len(), 3);
        assert_eq!(wrapped[2].len(), 5);
    }

    #[test]
    fn test_converter_handles_invalid_utf8() {
        let file = SourceFile::new("bad.txt", None, vec![b'o', b'k', 0xff, 0xfe]);
        let pdf = TextConverter.to_pdf(&file).unwrap();
        assert_eq!(page_count(&pdf), 1);
    }
}
