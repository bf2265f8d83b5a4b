//! Registration stamp overlay.

use chrono::{DateTime, Utc};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use qrcode::{Color, QrCode};
use serde::{Deserialize, Serialize};

use crate::error::ProcessError;
use crate::processor::{escape_pdf_string, inherited_attribute, page_box, resolve_dictionary};

const STAMP_MARGIN: f64 = 20.0;
const STAMP_PADDING: f64 = 6.0;
const TEXT_WIDTH: f64 = 200.0;
const TITLE_SIZE: f64 = 8.5;
const BODY_SIZE: f64 = 7.5;
const LINE_HEIGHT: f64 = 10.0;
const QR_SIZE: f64 = 56.0;
const MAX_LINE_CHARS: usize = 48;
const MAX_LINES: usize = 5;
const BAND_GAP: f64 = 10.0;

/// Distance from the top or bottom page edge that a stamp can reach, plus
/// a gap. Generated layouts keep their content out of it.
pub(crate) const STAMP_BAND: f64 = STAMP_MARGIN + QR_SIZE + 2.0 * STAMP_PADDING + BAND_GAP;

const TITLE_FONT: &str = "RegStampB";
const BODY_FONT: &str = "RegStampR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StampPosition {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl std::str::FromStr for StampPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(StampPosition::TopLeft),
            "top-right" => Ok(StampPosition::TopRight),
            "bottom-left" => Ok(StampPosition::BottomLeft),
            "bottom-right" => Ok(StampPosition::BottomRight),
            other => Err(format!("unknown stamp position '{}'", other)),
        }
    }
}

/// What gets printed inside the stamp box.
#[derive(Debug, Clone)]
pub struct StampContent {
    pub organization_name: String,
    pub department_name: Option<String>,
    pub registration_number: String,
    pub date_received: DateTime<Utc>,
    pub sender_name: String,
    pub sender_email: Option<String>,
    pub tracking_url: Option<String>,
}

impl StampContent {
    /// Text lines, title first.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.organization_name.clone()];
        if let Some(dept) = self.department_name.as_deref().filter(|d| !d.trim().is_empty()) {
            lines.push(dept.to_string());
        }
        lines.push(format!("Nr. inregistrare: {}", self.registration_number));
        lines.push(format!("Data: {}", self.date_received.format("%d.%m.%Y %H:%M")));

        let sender = match self.sender_email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) if email != self.sender_name => {
                format!("Expeditor: {} <{}>", self.sender_name, email)
            }
            _ => format!("Expeditor: {}", self.sender_name),
        };
        lines.push(sender);

        lines
            .into_iter()
            .map(|l| truncate_chars(&l, MAX_LINE_CHARS))
            .collect()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

struct StampBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn place_box(page: [f64; 4], width: f64, height: f64, position: StampPosition) -> StampBox {
    let [llx, lly, urx, ury] = page;
    let x = match position {
        StampPosition::TopLeft | StampPosition::BottomLeft => llx + STAMP_MARGIN,
        StampPosition::TopRight | StampPosition::BottomRight => urx - STAMP_MARGIN - width,
    };
    let y = match position {
        StampPosition::TopLeft | StampPosition::TopRight => ury - STAMP_MARGIN - height,
        StampPosition::BottomLeft | StampPosition::BottomRight => lly + STAMP_MARGIN,
    };
    StampBox {
        x,
        y,
        width,
        height,
    }
}

/// Builds the overlay content stream for one page.
fn stamp_operations(
    content: &StampContent,
    qr: Option<&QrCode>,
    page: [f64; 4],
    position: StampPosition,
) -> Vec<u8> {
    let lines = content.lines();
    let text_height = lines.len() as f64 * LINE_HEIGHT;
    let inner_height = if qr.is_some() {
        text_height.max(QR_SIZE)
    } else {
        text_height
    };
    let width = TEXT_WIDTH + if qr.is_some() { QR_SIZE + STAMP_PADDING } else { 0.0 } + 2.0 * STAMP_PADDING;
    let height = inner_height + 2.0 * STAMP_PADDING;
    let b = place_box(page, width, height, position);

    let mut ops = String::new();
    ops.push_str("q\n");
    ops.push_str("0.08 0.2 0.55 RG\n1.2 w\n");
    ops.push_str(&format!(
        "{:.2} {:.2} {:.2} {:.2} re S\n",
        b.x, b.y, b.width, b.height
    ));

    let text_x = b.x + STAMP_PADDING;
    let first_baseline = b.y + b.height - STAMP_PADDING - TITLE_SIZE;
    ops.push_str("BT\n0.08 0.2 0.55 rg\n");
    ops.push_str(&format!("{:.2} {:.2} Td\n{} TL\n", text_x, first_baseline, LINE_HEIGHT));
    for (i, line) in lines.iter().enumerate() {
        let (font, size) = if i == 0 {
            (TITLE_FONT, TITLE_SIZE)
        } else {
            (BODY_FONT, BODY_SIZE)
        };
        if i > 0 {
            ops.push_str("T*\n");
        }
        ops.push_str(&format!("/{} {} Tf\n({}) Tj\n", font, size, escape_pdf_string(line)));
    }
    ops.push_str("ET\n");

    if let Some(code) = qr {
        let modules = code.width();
        let module = QR_SIZE / modules as f64;
        let qr_x = b.x + b.width - STAMP_PADDING - QR_SIZE;
        let qr_y = b.y + (b.height - QR_SIZE) / 2.0;

        ops.push_str("0 0 0 rg\n");
        for (idx, color) in code.to_colors().iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let row = idx / modules;
            let col = idx % modules;
            let x = qr_x + col as f64 * module;
            let y = qr_y + (modules - 1 - row) as f64 * module;
            ops.push_str(&format!("{:.3} {:.3} {:.3} {:.3} re\n", x, y, module, module));
        }
        ops.push_str("f\n");
    }

    ops.push_str("Q\n");
    ops.into_bytes()
}

/// Copies the page's (possibly inherited) resources onto the page itself and
/// registers the stamp fonts.
fn install_fonts(
    doc: &mut Document,
    page_id: ObjectId,
    title_font: ObjectId,
    body_font: ObjectId,
) -> Result<(), lopdf::Error> {
    let mut resources = inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dictionary(doc, &obj))
        .unwrap_or_default();

    let mut fonts: Dictionary = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve_dictionary(doc, obj))
        .unwrap_or_default();
    fonts.set(TITLE_FONT, title_font);
    fonts.set(BODY_FONT, body_font);
    resources.set("Font", fonts);

    doc.get_dictionary_mut(page_id)?.set("Resources", resources);
    Ok(())
}

/// Wraps the existing page content in `q`/`Q` and appends the overlay.
fn append_overlay(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<(), lopdf::Error> {
    let existing = doc.get_page_contents(page_id);

    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    let mut contents: Vec<Object> = Vec::with_capacity(existing.len() + 3);
    contents.push(save_id.into());
    contents.extend(existing.into_iter().map(Object::Reference));
    contents.push(restore_id.into());
    contents.push(overlay_id.into());

    doc.get_dictionary_mut(page_id)?.set("Contents", contents);
    Ok(())
}

/// Stamps the first page, or every page when `all_pages` is set.
pub fn apply_stamp(
    doc: &mut Document,
    content: &StampContent,
    position: StampPosition,
    all_pages: bool,
) -> Result<(), ProcessError> {
    let _span = tracing::debug_span!(
        "processor.stamp",
        registration_number = %content.registration_number
    )
    .entered();

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    if pages.is_empty() {
        return Err(ProcessError::Stamp {
            page: 0,
            reason: "document has no pages".to_string(),
        });
    }

    let qr = match content.tracking_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => Some(QrCode::new(url.as_bytes()).map_err(|e| ProcessError::Stamp {
            page: pages[0].0,
            reason: format!("QR encoding failed: {}", e),
        })?),
        None => None,
    };

    let title_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let targets = if all_pages { &pages[..] } else { &pages[..1] };
    for &(page_number, page_id) in targets {
        let bounds = page_box(doc, page_id);
        let overlay = stamp_operations(content, qr.as_ref(), bounds, position);

        install_fonts(doc, page_id, title_font, body_font)
            .and_then(|_| append_overlay(doc, page_id, overlay))
            .map_err(|e| ProcessError::Stamp {
                page: page_number,
                reason: e.to_string(),
            })?;
    }

    Ok(())
}
