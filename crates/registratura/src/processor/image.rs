use image::{GenericImageView, ImageFormat};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::ProcessError;
use crate::processor::{finish_document, DocumentFormat, PdfConverter, SourceFile, A4_HEIGHT, A4_WIDTH};

const PAGE_MARGIN: f64 = 36.0;

pub struct ImageConverter;

impl PdfConverter for ImageConverter {
    fn to_pdf(&self, file: &SourceFile) -> Result<Vec<u8>, ProcessError> {
        let _span = tracing::info_span!("processor.image", filename = %file.filename).entered();
        create_image_pdf(&file.bytes)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Image)
    }
}

/// Returns `(page_width, page_height, draw_x, draw_y, draw_w, draw_h)` for an
/// image of the given pixel size, fitted inside an A4 page with margins.
/// Wider-than-tall images get a landscape page.
pub(crate) fn fit_on_page(width: u32, height: u32) -> (f64, f64, f64, f64, f64, f64) {
    let (page_w, page_h) = if width > height {
        (A4_HEIGHT, A4_WIDTH)
    } else {
        (A4_WIDTH, A4_HEIGHT)
    };

    let avail_w = page_w - 2.0 * PAGE_MARGIN;
    let avail_h = page_h - 2.0 * PAGE_MARGIN;
    let scale = (avail_w / width.max(1) as f64).min(avail_h / height.max(1) as f64);

    let draw_w = width as f64 * scale;
    let draw_h = height as f64 * scale;
    let x = (page_w - draw_w) / 2.0;
    let y = (page_h - draw_h) / 2.0;

    (page_w, page_h, x, y, draw_w, draw_h)
}

/// Reads the frame header of a JPEG and returns the PDF colour space its
/// DCT stream can be embedded with unchanged. CMYK, YCCK and 12-bit frames
/// return `None`: the decoder hands them back as RGB, which no longer
/// matches the encoded components.
fn dct_color_space(data: &[u8]) -> Option<&'static str> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if matches!(marker, 0x01 | 0xD0..=0xD7) {
            pos += 2;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let precision = *data.get(pos + 4)?;
            let components = *data.get(pos + 9)?;
            return match (precision, components) {
                (8, 1) => Some("DeviceGray"),
                (8, 3) => Some("DeviceRGB"),
                _ => None,
            };
        }
        if marker == 0xDA {
            return None;
        }
        pos += 2 + length;
    }
    None
}

fn create_image_pdf(image_data: &[u8]) -> Result<Vec<u8>, ProcessError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ProcessError::ImageProcessing("Image has no pixels".to_string()));
    }

    // 8-bit gray and RGB JPEGs are embedded as-is; everything else is
    // re-encoded as raw RGB.
    let passthrough = match image::guess_format(image_data) {
        Ok(ImageFormat::Jpeg) => dct_color_space(image_data),
        _ => None,
    };

    let image_stream = if let Some(color_space) = passthrough {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image_data.to_vec(),
        )
    } else {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            img.to_rgb8().into_raw(),
        )
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(image_stream);
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let (page_w, page_h, x, y, draw_w, draw_h) = fit_on_page(width, height);
    let content = format!(
        "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im1 Do\nQ\n",
        draw_w, draw_h, x, y
    );
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(page_w as f32), Object::Real(page_h as f32)],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    finish_document(doc, pages_id, vec![page_id])
}
