//! Web-push subscriptions and broadcast fan-out.

pub mod delivery;
pub mod service;
pub mod subscription;

use thiserror::Error;

pub use delivery::{DeliveryError, HttpPushRelay, PushDelivery};
pub use service::{BroadcastReport, NotificationService};
pub use subscription::{
    endpoint_hash, NewSubscription, NotificationHistory, NotificationPayload, PushSubscription,
    SubscriptionKeys,
};

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Invalid subscription: {0}")]
    Validation(String),

    #[error("Subscription store busy after {attempts} attempts: {source}")]
    Contention {
        attempts: u32,
        #[source]
        source: crate::db::DatabaseError,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Push relay setup failed: {0}")]
    Relay(String),
}
