use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

use super::subscription::{NotificationPayload, PushSubscription, SubscriptionKeys};
use super::PushError;
use crate::sanitize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The push service no longer knows this endpoint.
    #[error("subscription gone")]
    Gone,

    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Transport for a single web-push message.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct RelaySubscription<'a> {
    endpoint: &'a str,
    keys: &'a SubscriptionKeys,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    subscription: RelaySubscription<'a>,
    payload: &'a NotificationPayload,
}

/// Hands messages to an HTTP relay that performs the VAPID signing and
/// payload encryption.
pub struct HttpPushRelay {
    client: reqwest::Client,
    relay_url: String,
    auth_token: Option<SecretString>,
}

impl HttpPushRelay {
    pub fn new(
        relay_url: impl Into<String>,
        timeout: Duration,
        auth_token: Option<SecretString>,
    ) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Relay(e.to_string()))?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
            auth_token,
        })
    }
}

/// Maps a relay response status to a delivery result.
fn classify_status(status: StatusCode, body: &str) -> Result<(), DeliveryError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        Err(DeliveryError::Gone)
    } else {
        let detail: String = body.trim().chars().take(200).collect();
        Err(DeliveryError::Failed(format!("relay returned {}: {}", status, detail)))
    }
}

#[async_trait]
impl PushDelivery for HttpPushRelay {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        let body = RelayRequest {
            subscription: RelaySubscription {
                endpoint: &subscription.endpoint,
                keys: &subscription.keys,
            },
            payload,
        };

        let mut request = self.client.post(&self.relay_url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(
                endpoint = %sanitize::redact_url(&subscription.endpoint),
                error = %e,
                "Relay request failed"
            );
            DeliveryError::Failed(e.to_string())
        })?;

        let status = response.status();
        let text = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        classify_status(status, &text)
    }
}
