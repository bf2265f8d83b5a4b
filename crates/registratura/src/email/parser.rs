//! Email parsing and attachment extraction.

use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

use super::error::{EmailError, Result};
use super::message::{EmailAttachment, IncomingEmail};

/// Parser turning raw RFC 822 bytes into [`IncomingEmail`]s.
pub struct EmailParser {
    max_attachment_size: u64,
}

impl EmailParser {
    pub fn new(max_attachment_size: u64) -> Self {
        Self {
            max_attachment_size,
        }
    }

    /// Parses a raw message. A message without a sender address is rejected.
    pub fn parse(&self, raw_email: &[u8], uid: u32) -> Result<IncomingEmail> {
        let message = MessageParser::default()
            .parse(raw_email)
            .ok_or_else(|| EmailError::ParseError("Failed to parse email message".to_string()))?;

        let sender = message.from().and_then(|addr| addr.first());
        let sender_email = sender
            .and_then(|a| a.address())
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| EmailError::ParseError(format!("Message UID={} has no sender", uid)))?;
        let sender_name = sender
            .and_then(|a| a.name())
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let date = message
            .date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
            .unwrap_or_else(Utc::now);

        let attachments = self.extract_attachments(&message, uid);

        debug!(
            "Parsed email UID={} subject={:?} attachments={}",
            uid,
            message.subject().unwrap_or("(no subject)"),
            attachments.len()
        );

        Ok(IncomingEmail {
            uid,
            from: message
                .from()
                .and_then(|addr| addr.first().map(format_address))
                .unwrap_or_else(|| sender_email.clone()),
            sender_name,
            sender_email,
            to: message.to().and_then(|addr| addr.first().map(format_address)),
            subject: message.subject().unwrap_or_default().trim().to_string(),
            body: message
                .body_text(0)
                .map(|b| b.into_owned())
                .unwrap_or_default(),
            body_html: html_body(&message),
            date,
            message_id: message.message_id().map(|s| s.to_string()),
            attachments,
        })
    }

    fn extract_attachments(&self, message: &Message, uid: u32) -> Vec<EmailAttachment> {
        let mut attachments = Vec::new();

        for part in message.parts.iter() {
            if !is_attachment(part) {
                continue;
            }

            let content = match &part.body {
                PartType::Binary(data) | PartType::InlineBinary(data) => data.to_vec(),
                PartType::Text(text) => text.as_bytes().to_vec(),
                PartType::Html(html) => html.as_bytes().to_vec(),
                _ => continue,
            };

            let mime_type = part.content_type().map(|ct| match ct.subtype() {
                Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                None => ct.ctype().to_string(),
            });

            let filename = attachment_filename(part, mime_type.as_deref());

            if content.len() as u64 > self.max_attachment_size {
                debug!(
                    "Attachment '{}' in UID={} too large: {} > {}",
                    filename,
                    uid,
                    content.len(),
                    self.max_attachment_size
                );
                continue;
            }

            attachments.push(EmailAttachment {
                filename,
                content_type: mime_type,
                content,
            });
        }

        attachments
    }
}

/// The original HTML part, if the message has one. Text-only messages
/// yield `None` rather than synthesized markup.
fn html_body(message: &Message) -> Option<String> {
    message
        .html_body
        .first()
        .and_then(|id| message.parts.get(*id as usize))
        .and_then(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        })
}

/// Checks if a message part is an attachment.
fn is_attachment(part: &MessagePart) -> bool {
    if let Some(disposition) = part.content_disposition() {
        if disposition.ctype() == "attachment" {
            return true;
        }
    }

    // Named inline parts
    if part.attachment_name().is_some() {
        return true;
    }

    if let Some(content_type) = part.content_type() {
        let ctype = content_type.ctype();
        // text/* and multipart/* are body structure, message/* is a container
        if ctype != "text" && ctype != "multipart" && ctype != "message" {
            return content_type.subtype().is_some();
        }
    }

    false
}

fn attachment_filename(part: &MessagePart, mime_type: Option<&str>) -> String {
    let raw = part
        .attachment_name()
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
        .map(|s| s.trim().to_string());

    match raw {
        Some(name) if !name.is_empty() => name,
        _ => format!(
            "attachment.{}",
            mime_to_extension(mime_type.unwrap_or("application/octet-stream"))
        ),
    }
}

/// Formats an address as "Name <email@example.com>" when a name is present.
fn format_address(addr: &mail_parser::Addr) -> String {
    if let Some(name) = addr.name() {
        format!("{} <{}>", name, addr.address().unwrap_or_default())
    } else {
        addr.address().unwrap_or_default().to_string()
    }
}

fn mime_to_extension(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/tiff" => "tiff",
        "image/bmp" => "bmp",
        "text/plain" => "txt",
        "text/html" => "html",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: \"Ion Popescu\" <ion@example.com>\r\n\
To: registratura@primarie.ro\r\n\
Subject: Cerere certificat\r\n\
Message-ID: <abc123@example.com>\r\n\
Date: Tue, 14 Jan 2025 09:30:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Va rog sa imi eliberati certificatul.\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"cerere.pdf\"\r\n\
Content-Disposition: attachment; filename=\"cerere.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQKJWZha2UK\r\n\
--XYZ--\r\n";

    #[test]
    fn test_parse_multipart_message() {
        let parser = EmailParser::new(1024 * 1024);
        let email = parser.parse(MULTIPART.as_bytes(), 7).unwrap();

        assert_eq!(email.uid, 7);
        assert_eq!(email.sender_email, "ion@example.com");
        assert_eq!(email.sender_name.as_deref(), Some("Ion Popescu"));
        assert_eq!(email.from, "Ion Popescu <ion@example.com>");
        assert_eq!(email.subject, "Cerere certificat");
        assert_eq!(email.message_id.as_deref(), Some("abc123@example.com"));
        assert!(email.body.contains("certificatul"));
        assert!(email.body_html.is_none());
        assert_eq!(email.date.to_rfc3339(), "2025-01-14T09:30:00+00:00");

        assert_eq!(email.attachments.len(), 1);
        let att = &email.attachments[0];
        assert_eq!(att.filename, "cerere.pdf");
        assert_eq!(att.content_type.as_deref(), Some("application/pdf"));
        assert!(att.content.starts_with(b"%PDF-1.4"));
    }

    #[test]
    fn test_oversized_attachment_dropped() {
        let parser = EmailParser::new(4);
        let email = parser.parse(MULTIPART.as_bytes(), 1).unwrap();
        assert!(email.attachments.is_empty());
    }

    #[test]
    fn test_missing_sender_rejected() {
        let raw = "To: a@b.ro\r\nSubject: x\r\n\r\nbody\r\n";
        let parser = EmailParser::new(1024);
        assert!(matches!(
            parser.parse(raw.as_bytes(), 1),
            Err(EmailError::ParseError(_))
        ));
    }

    #[test]
    fn test_mime_to_extension() {
        assert_eq!(mime_to_extension("application/pdf"), "pdf");
        assert_eq!(mime_to_extension("IMAGE/JPEG"), "jpg");
        assert_eq!(mime_to_extension("unknown/type"), "bin");
    }
}
