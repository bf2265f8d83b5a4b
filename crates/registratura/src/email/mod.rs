//! Inbound mail: the `Mailbox` abstraction, an IMAP implementation of it,
//! and RFC 822 parsing into [`IncomingEmail`].

pub mod client;
pub mod error;
pub mod message;
pub mod parser;

use async_trait::async_trait;

pub use client::ImapMailbox;
pub use error::EmailError;
pub use message::{EmailAttachment, IncomingEmail};
pub use parser::EmailParser;

/// A source of unread messages.
///
/// `fetch_new_emails` must not change read state; a message only becomes
/// seen through `mark_seen`.
#[async_trait]
pub trait Mailbox: Send {
    async fn connect(&mut self) -> error::Result<()>;

    async fn fetch_new_emails(&mut self) -> error::Result<Vec<IncomingEmail>>;

    async fn mark_seen(&mut self, uid: u32) -> error::Result<()>;

    async fn disconnect(&mut self) -> error::Result<()>;
}
