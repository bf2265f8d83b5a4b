//! Test harness for isolated test execution.
//!
//! The `TestHarness` struct wires a `RegistryService` and a
//! `NotificationService` over:
//! - an in-memory `Database`
//! - a `LocalBlobStore` rooted in a temp directory
//! - a `UrlFetcher` that reads store URLs straight from that directory

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use registratura::db::Database;
use registratura::email::{EmailError, IncomingEmail, Mailbox};
use registratura::processor::StampPosition;
use registratura::push::{
    DeliveryError, NewSubscription, NotificationPayload, NotificationService, PushDelivery,
    PushSubscription, SubscriptionKeys,
};
use registratura::registry::{
    IngestOutcome, RegistrationNumberGenerator, RegistryService, RegistrySettings,
};
use registratura::retry::RetryPolicy;
use registratura::storage::{BlobStore, LocalBlobStore, UrlFetcher};

pub const PUBLIC_BASE_URL: &str = "http://blobs.primaria.test";

/// Isolated environment for one integration test.
pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub store: Arc<LocalBlobStore>,
    pub registry: RegistryService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    /// Builds the harness after letting the caller adjust the settings.
    pub fn with_settings(adjust: impl FnOnce(&mut RegistrySettings)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open database");
        let store = Arc::new(LocalBlobStore::new(temp_dir.path(), PUBLIC_BASE_URL));
        let blob_store: Arc<dyn BlobStore> = store.clone();
        let fetcher = Arc::new(
            UrlFetcher::new(Arc::clone(&blob_store), Duration::from_secs(5))
                .expect("Failed to build fetcher"),
        );
        let numbers = RegistrationNumberGenerator::new(
            db.clone(),
            "REG",
            RetryPolicy::new(5, Duration::from_millis(1)),
        );

        let mut settings = RegistrySettings {
            organization_name: "Primăria Comunei Test".to_string(),
            department_name: Some("Registratură".to_string()),
            prefix: "REG".to_string(),
            stamp_position: StampPosition::TopRight,
            stamp_all_pages: false,
            tracking_base_url: Some("https://primaria.test/urmarire".to_string()),
            external_timeout: Duration::from_secs(10),
            claim_lease: Duration::from_secs(600),
        };
        adjust(&mut settings);

        let registry = RegistryService::new(db.clone(), blob_store, fetcher, numbers, settings);

        Self {
            temp_dir,
            db,
            store,
            registry,
        }
    }

    pub fn blob_root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Ingests a message that is expected to produce a record.
    /// Returns `(record_id, registration_number)`.
    pub async fn ingest_created(&self, email: IncomingEmail) -> (String, String) {
        match self.registry.ingest(email).await {
            Ok(IngestOutcome::Created {
                record_id,
                registration_number,
                ..
            }) => (record_id, registration_number),
            other => panic!("Expected a created record, got {:?}", other),
        }
    }

    pub fn notifications(&self, delivery: Arc<dyn PushDelivery>) -> NotificationService {
        NotificationService::new(
            self.db.clone(),
            delivery,
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
    }
}

/// In-memory mailbox. Fetch returns every message not yet marked seen.
pub struct FakeMailbox {
    messages: Vec<IncomingEmail>,
    pub seen: Vec<u32>,
    pub connected: bool,
    pub connects: u32,
    pub fail_fetch: bool,
}

impl FakeMailbox {
    pub fn new(messages: Vec<IncomingEmail>) -> Self {
        Self {
            messages,
            seen: Vec::new(),
            connected: false,
            connects: 0,
            fail_fetch: false,
        }
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn connect(&mut self) -> Result<(), EmailError> {
        self.connected = true;
        self.connects += 1;
        Ok(())
    }

    async fn fetch_new_emails(&mut self) -> Result<Vec<IncomingEmail>, EmailError> {
        if !self.connected {
            return Err(EmailError::ConnectionFailed("not connected".to_string()));
        }
        if self.fail_fetch {
            return Err(EmailError::ProtocolError("UID SEARCH failed".to_string()));
        }
        Ok(self
            .messages
            .iter()
            .filter(|m| !self.seen.contains(&m.uid))
            .cloned()
            .collect())
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<(), EmailError> {
        self.seen.push(uid);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), EmailError> {
        self.connected = false;
        Ok(())
    }
}

/// Delivery that answers per endpoint from a script; unscripted
/// endpoints succeed. Every attempted endpoint is recorded in order.
#[derive(Default)]
pub struct ScriptedDelivery {
    script: HashMap<String, DeliveryError>,
    pub attempts: Mutex<Vec<String>>,
}

impl ScriptedDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, endpoint: &str, error: DeliveryError) -> Self {
        self.script.insert(endpoint.to_string(), error);
        self
    }

    pub fn attempted(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushDelivery for ScriptedDelivery {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        _payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        self.attempts
            .lock()
            .unwrap()
            .push(subscription.endpoint.clone());
        match self.script.get(&subscription.endpoint) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

pub fn subscription(endpoint: &str, platform: &str) -> NewSubscription {
    NewSubscription {
        endpoint: endpoint.to_string(),
        keys: SubscriptionKeys {
            p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".to_string(),
            auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
        },
        platform: Some(platform.to_string()),
        user_agent: None,
        user_id: None,
    }
}
