use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::processor::StampPosition;
use crate::registry::DEFAULT_PREFIX;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub mailbox: Option<MailboxConfig>,
    #[serde(default)]
    pub push: Option<PushConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationConfig {
    pub name: String,
    #[serde(default)]
    pub department_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Defaults to `~/.registratura/data/registratura.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match self.path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => Some(crate::secrets::expand_home(path)),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub root: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub stamp_position: StampPosition,
    #[serde(default)]
    pub stamp_all_pages: bool,
    #[serde(default)]
    pub tracking_base_url: Option<String>,
    #[serde(default = "default_counter_attempts")]
    pub counter_max_attempts: u32,
    #[serde(default = "default_external_timeout")]
    pub external_timeout_secs: u64,
    /// How long an unfinished message claim blocks other intakes.
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_counter_attempts() -> u32 {
    5
}

fn default_external_timeout() -> u64 {
    30
}

fn default_claim_lease() -> u64 {
    900
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            stamp_position: StampPosition::default(),
            stamp_all_pages: false,
            tracking_base_url: None,
            counter_max_attempts: default_counter_attempts(),
            external_timeout_secs: default_external_timeout(),
            claim_lease_secs: default_claim_lease(),
        }
    }
}

impl RegistryConfig {
    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }
}

/// Mailbox credentials. At most one source is used, in the order
/// password, password file, environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxAuth {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxConfig {
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    pub username: String,
    #[serde(default)]
    pub auth: MailboxAuth,
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Seconds between polls in watch mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size: u64,
}

fn default_imap_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_poll_interval() -> u64 {
    300
}

fn default_batch_size() -> usize {
    50
}

fn default_max_attachment_size() -> u64 {
    25 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConfig {
    pub relay_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub auth_token_file: Option<String>,
    #[serde(default)]
    pub auth_token_env_var: Option<String>,
    #[serde(default = "default_subscribe_attempts")]
    pub subscribe_max_attempts: u32,
    #[serde(default = "default_subscribe_backoff")]
    pub subscribe_backoff_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_subscribe_attempts() -> u32 {
    5
}

fn default_subscribe_backoff() -> u64 {
    100
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let registry = RegistryConfig::default();
        assert_eq!(registry.prefix, "REG");
        assert_eq!(registry.stamp_position, StampPosition::TopRight);
        assert!(!registry.stamp_all_pages);
        assert_eq!(registry.external_timeout(), Duration::from_secs(30));
        assert_eq!(registry.claim_lease(), Duration::from_secs(900));
    }

    #[test]
    fn test_mailbox_defaults_fill_in() {
        let json = r#"{"host": "imap.primaria.ro", "username": "registratura"}"#;
        let mailbox: MailboxConfig = serde_json::from_str(json).unwrap();
        assert_eq!(mailbox.port, 993);
        assert!(mailbox.use_tls);
        assert_eq!(mailbox.folder, "INBOX");
        assert_eq!(mailbox.batch_size, 50);
        assert_eq!(mailbox.max_attachment_size, 26_214_400);
    }

    #[test]
    fn test_log_format_lowercase() {
        let logging: LoggingConfig =
            serde_json::from_str(r#"{"level": "debug", "format": "json"}"#).unwrap();
        assert_eq!(logging.format, LogFormat::Json);
        assert_eq!(logging.level, "debug");
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let db = DatabaseConfig {
            path: Some("/var/lib/registratura/registry.db".to_string()),
        };
        assert_eq!(
            db.resolved_path(),
            Some(PathBuf::from("/var/lib/registratura/registry.db"))
        );
    }
}
