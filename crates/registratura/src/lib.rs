pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod push;
pub mod registry;
pub mod requests;
pub mod retry;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod telemetry;

pub use config::{load_config, Config};
pub use db::Database;
pub use email::{EmailParser, ImapMailbox, IncomingEmail, Mailbox};
pub use error::{ConfigError, ProcessError, RegistraturaError, Result, StorageError};
pub use pipeline::{DocumentPipeline, MergeOutcome, ProcessOptions};
pub use processor::{DocumentFormat, SourceFile, StampPosition};
pub use push::{BroadcastReport, HttpPushRelay, NotificationService, PushDelivery};
pub use registry::{
    IngestOutcome, IngestReport, ProcessAttachmentsReport, RecordStatus, RegistryRecord,
    RegistryService, RegistrySettings,
};
pub use requests::RequestService;
pub use retry::RetryPolicy;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::{BlobStore, LocalBlobStore, UrlFetcher};
pub use telemetry::init_tracing;
