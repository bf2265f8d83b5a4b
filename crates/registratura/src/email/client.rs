//! IMAP mailbox.

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::config::MailboxConfig;

use super::error::{EmailError, Result};
use super::message::IncomingEmail;
use super::parser::EmailParser;
use super::Mailbox;

/// Async TCP stream (async-io wrapper around std's TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Reads unseen messages from one IMAP folder.
pub struct ImapMailbox {
    session: Option<Session<TlsStream>>,
    config: MailboxConfig,
    parser: EmailParser,
}

impl ImapMailbox {
    pub fn new(config: MailboxConfig) -> Self {
        let parser = EmailParser::new(config.max_attachment_size);
        Self {
            session: None,
            config,
            parser,
        }
    }

    /// Checks if the client is currently connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn password(&self) -> Result<SecretString> {
        let auth = &self.config.auth;
        if auth.password.is_some() {
            warn!(
                "Using a direct password value is not recommended. \
                 Consider passwordEnvVar or passwordFile instead."
            );
        }
        crate::secrets::resolve_secret(
            auth.password.as_deref(),
            auth.password_file.as_deref(),
            auth.password_env_var.as_deref(),
        )
        .map_err(|e| EmailError::CredentialsNotFound(e.to_string()))
    }

    fn session(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| EmailError::ConnectionFailed("Not connected".to_string()))
    }

    async fn select_folder(&mut self) -> Result<()> {
        let folder = self.config.folder.clone();
        let session = self.session()?;

        session.select(&folder).await.map_err(|e| {
            let text = e.to_string();
            if text.contains("doesn't exist") || text.contains("NO") {
                EmailError::FolderNotFound(folder.clone())
            } else {
                EmailError::ProtocolError(text)
            }
        })?;

        debug!("Selected folder '{}'", folder);
        Ok(())
    }

    async fn unseen_uids(&mut self) -> Result<Vec<u32>> {
        let session = self.session()?;
        let uids = session
            .uid_search("UNSEEN")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();
        Ok(uid_list)
    }

    /// Fetches raw messages without touching their `\Seen` flag.
    async fn fetch_raw(&mut self, uids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let uid_set = uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let session = self.session()?;
        let mut messages = session
            .uid_fetch(&uid_set, "(UID BODY.PEEK[])")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(message_result) = messages.next().await {
            match message_result {
                Ok(message) => {
                    if let (Some(uid), Some(body)) = (message.uid, message.body()) {
                        results.push((uid, body.to_vec()));
                    } else {
                        warn!("Message missing UID or body");
                    }
                }
                Err(e) => warn!("Error fetching message: {}", e),
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if !self.config.use_tls {
            return Err(EmailError::ConfigError(
                "TLS is required for mailbox connections".to_string(),
            ));
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to IMAP server at {}", addr);

        let std_stream = std::net::TcpStream::connect(&addr)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = async_io::Async::new(std_stream)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;

        let tls_stream = TlsConnector::new()
            .connect(&self.config.host, tcp_stream)
            .await?;

        let client = async_imap::Client::new(tls_stream);
        let password = self.password()?;
        let session = client
            .login(&self.config.username, password.expose_secret())
            .await
            .map_err(|(e, _)| EmailError::AuthenticationFailed(e.to_string()))?;

        info!("Authenticated to IMAP server");
        self.session = Some(session);
        self.select_folder().await
    }

    async fn fetch_new_emails(&mut self) -> Result<Vec<IncomingEmail>> {
        let mut uids = self.unseen_uids().await?;
        uids.truncate(self.config.batch_size);
        debug!("Fetching {} unseen messages", uids.len());

        let raw = self.fetch_raw(&uids).await?;
        let mut emails = Vec::with_capacity(raw.len());
        for (uid, bytes) in raw {
            match self.parser.parse(&bytes, uid) {
                Ok(email) => emails.push(email),
                // Left unseen; an operator can inspect it in the mailbox.
                Err(e) => warn!("Skipping unparseable message UID={}: {}", uid, e),
            }
        }
        Ok(emails)
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<()> {
        let session = self.session()?;
        let updates = session
            .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        let results: Vec<_> = updates.collect().await;
        for result in results {
            result.map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            session
                .logout()
                .await
                .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapMailbox dropped without explicit disconnect - session will be closed");
        }
    }
}
