//! Builders for inbound messages and document fixtures.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use chrono::{DateTime, TimeZone, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;

use registratura::email::IncomingEmail;

/// Builder for `IncomingEmail` instances.
pub struct MessageBuilder {
    email: IncomingEmail,
}

impl MessageBuilder {
    /// A plain citizen request with a unique-looking message id.
    pub fn new(uid: u32) -> Self {
        let mut email = IncomingEmail::new(
            uid,
            "ion.popescu@example.ro",
            "Cerere eliberare adeverinta",
            "Buna ziua, va rog sa-mi eliberati o adeverinta de domiciliu.",
        )
        .with_message_id(format!("<msg-{}@example.ro>", uid));
        email.sender_name = Some("Ion Popescu".to_string());
        email.date = Utc.with_ymd_and_hms(2026, 3, 2, 9, 15, 0).unwrap();
        Self { email }
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.email.message_id = Some(id.to_string());
        self
    }

    pub fn sender(mut self, address: &str) -> Self {
        self.email.sender_email = address.to_string();
        self.email.from = address.to_string();
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.email.subject = subject.to_string();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.email.body = body.to_string();
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.email.date = date;
        self
    }

    pub fn attachment(mut self, filename: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        self.email = self.email.with_attachment(filename, Some(content_type), bytes);
        self
    }

    pub fn build(self) -> IncomingEmail {
        self.email
    }
}

/// A PDF with `pages` pages of the given size, each showing `label` and
/// its page number.
pub fn pdf_fixture(label: &str, pages: usize, width: i64, height: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content = format!("BT /F1 14 Tf 40 40 Td ({} {}) Tj ET", label, n);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, ImageFormat::Png)
}

pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, ImageFormat::Jpeg)
}

/// A minimal DOCX whose body holds one paragraph per entry.
pub fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut bytes = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut bytes));
        let options = SimpleFileOptions::default();
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer
            .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
            .unwrap();
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    bytes
}

/// Bytes that look like a PDF to content sniffing but do not parse.
pub fn corrupt_pdf_fixture() -> Vec<u8> {
    b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj << /Type /Catalog /Pages 9 0 R >>\nthis is not a pdf".to_vec()
}
