use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// A parsed inbound message, as handed to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEmail {
    /// Mailbox UID, used to mark the message seen after registration.
    pub uid: u32,
    /// The raw `From` header value for display.
    pub from: String,
    pub sender_name: Option<String>,
    pub sender_email: String,
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
    pub date: DateTime<Utc>,
    pub message_id: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

impl IncomingEmail {
    /// A message without any attachments, mostly for tests and manual intake.
    pub fn new(
        uid: u32,
        sender_email: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let sender_email = sender_email.into();
        Self {
            uid,
            from: sender_email.clone(),
            sender_name: None,
            sender_email,
            to: None,
            subject: subject.into(),
            body: body.into(),
            body_html: None,
            date: Utc::now(),
            message_id: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_attachment(
        mut self,
        filename: impl Into<String>,
        content_type: Option<&str>,
        content: Vec<u8>,
    ) -> Self {
        self.attachments.push(EmailAttachment {
            filename: filename.into(),
            content_type: content_type.map(str::to_string),
            content,
        });
        self
    }
}
