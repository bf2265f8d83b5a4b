use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use super::delivery::{DeliveryError, PushDelivery};
use super::subscription::{
    endpoint_hash, NewSubscription, NotificationHistory, NotificationPayload, PushSubscription,
};
use super::PushError;
use crate::db::{notification_repo, subscription_repo, Database, DatabaseError};
use crate::retry::{retry_transient, RetryPolicy};
use crate::sanitize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub sent: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

/// Owns subscription bookkeeping and broadcast fan-out.
pub struct NotificationService {
    db: Database,
    delivery: Arc<dyn PushDelivery>,
    subscribe_retry: RetryPolicy,
}

impl NotificationService {
    pub fn new(db: Database, delivery: Arc<dyn PushDelivery>, subscribe_retry: RetryPolicy) -> Self {
        Self {
            db,
            delivery,
            subscribe_retry,
        }
    }

    /// Registers or refreshes a subscription. Re-subscribing the same
    /// endpoint updates the existing row instead of adding one.
    pub async fn subscribe(&self, input: NewSubscription) -> Result<PushSubscription, PushError> {
        validate_subscription(&input)?;

        let hash = endpoint_hash(&input.endpoint);
        let db = self.db.clone();
        let stored = retry_transient(
            &self.subscribe_retry,
            "push_subscribe",
            |e: &DatabaseError| e.is_busy(),
            || {
                subscription_repo::upsert(&db, &hash, &input)?;
                subscription_repo::find(&db, &hash)
            },
        )
        .await
        .map_err(|failure| {
            if failure.exhausted {
                PushError::Contention {
                    attempts: failure.attempts,
                    source: failure.error,
                }
            } else {
                PushError::Database(failure.error)
            }
        })?;

        let subscription = stored.ok_or_else(|| {
            PushError::Validation(format!("subscription {} vanished after upsert", &hash[..12]))
        })?;

        info!(
            endpoint = %sanitize::redact_url(&subscription.endpoint),
            platform = subscription.platform.as_deref().unwrap_or("unknown"),
            "Push subscription stored"
        );
        Ok(subscription)
    }

    /// Marks the endpoint's subscription inactive. Returns whether one existed.
    pub fn unsubscribe(&self, endpoint: &str) -> Result<bool, PushError> {
        let found = subscription_repo::deactivate(&self.db, &endpoint_hash(endpoint))?;
        if found {
            info!(endpoint = %sanitize::redact_url(endpoint), "Push subscription deactivated");
        }
        Ok(found)
    }

    pub fn active_subscriptions(&self) -> Result<Vec<PushSubscription>, PushError> {
        Ok(subscription_repo::list_active(&self.db)?)
    }

    pub fn history(&self, limit: u64) -> Result<Vec<NotificationHistory>, PushError> {
        Ok(notification_repo::list_recent(&self.db, limit)?)
    }

    /// Sends `payload` to every active subscription.
    pub async fn broadcast(&self, payload: &NotificationPayload) -> Result<BroadcastReport, PushError> {
        let subscriptions = self.active_subscriptions()?;
        self.broadcast_to(payload, &subscriptions).await
    }

    /// Delivers to each subscription in turn. One subscription's failure
    /// never stops the others; the outcome is logged to history.
    pub async fn broadcast_to(
        &self,
        payload: &NotificationPayload,
        subscriptions: &[PushSubscription],
    ) -> Result<BroadcastReport, PushError> {
        let span = info_span!("push.broadcast", recipients = subscriptions.len());
        async move {
            let mut report = BroadcastReport::default();

            for sub in subscriptions {
                let target = sanitize::redact_url(&sub.endpoint);
                match self.delivery.deliver(sub, payload).await {
                    Ok(()) => {
                        report.sent += 1;
                        if let Err(e) = subscription_repo::record_success(&self.db, &sub.endpoint_hash) {
                            warn!(endpoint = %target, error = %e, "Failed to record delivery");
                        }
                    }
                    Err(DeliveryError::Gone) => {
                        report.failed += 1;
                        report.errors.push(format!("{}: subscription gone", target));
                        if let Err(e) = subscription_repo::deactivate(&self.db, &sub.endpoint_hash) {
                            warn!(endpoint = %target, error = %e, "Failed to deactivate gone subscription");
                        }
                    }
                    Err(DeliveryError::Failed(reason)) => {
                        report.failed += 1;
                        report.errors.push(format!("{}: {}", target, reason));
                        if let Err(e) =
                            subscription_repo::record_failure(&self.db, &sub.endpoint_hash, &reason)
                        {
                            warn!(endpoint = %target, error = %e, "Failed to record delivery failure");
                        }
                    }
                }
            }

            let entry = NotificationHistory {
                id: uuid::Uuid::new_v4().to_string(),
                title: payload.title.clone(),
                body: payload.body.clone(),
                url: payload.url.clone(),
                recipients: subscriptions.len() as u32,
                sent: report.sent,
                failed: report.failed,
                created_at: Utc::now(),
            };
            notification_repo::insert(&self.db, &entry)?;

            info!(sent = report.sent, failed = report.failed, "Broadcast finished");
            Ok(report)
        }
        .instrument(span)
        .await
    }
}

fn validate_subscription(input: &NewSubscription) -> Result<(), PushError> {
    let endpoint = input.endpoint.trim();
    if endpoint.is_empty() {
        return Err(PushError::Validation("endpoint is required".to_string()));
    }
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        return Err(PushError::Validation(format!(
            "endpoint must be an http(s) URL, got '{}'",
            sanitize::redact_url(endpoint)
        )));
    }
    if input.keys.p256dh.trim().is_empty() || input.keys.auth.trim().is_empty() {
        return Err(PushError::Validation("keys.p256dh and keys.auth are required".to_string()));
    }
    Ok(())
}
