//! Subscription Registry
//!
//! Manages webhook subscriptions and the set of signatures each one
//! observes. A signature may be tracked by at most one subscriber at a
//! time; read-modify-write cycles on subscriptions run under a single
//! mutation lock so concurrent track/untrack calls cannot clobber each
//! other.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::storage::{StorageError, SubscriptionStore};
use crate::types::webhook::{DeadLetter, RegistryStats, WebhookSubscription};

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(String),

    #[error("signature already tracked by {0}")]
    AlreadyTracked(String),

    #[error("invalid subscription: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Durable registry of webhook subscriptions
pub struct SubscriptionRegistry {
    store: Arc<dyn SubscriptionStore>,
    // Serializes read-modify-write cycles across subscriptions
    mutation: Mutex<()>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            mutation: Mutex::new(()),
        }
    }

    /// Create or replace a subscriber's webhook registration
    pub async fn subscribe(
        &self,
        subscriber_id: &str,
        callback_url: &str,
        shared_secret: &str,
    ) -> Result<(), RegistryError> {
        if subscriber_id.trim().is_empty() {
            return Err(RegistryError::Validation(
                "subscriber id is required".to_string(),
            ));
        }
        if !callback_url.starts_with("http://") && !callback_url.starts_with("https://") {
            return Err(RegistryError::Validation(
                "callback url must be http(s)".to_string(),
            ));
        }
        if shared_secret.is_empty() {
            return Err(RegistryError::Validation(
                "shared secret is required".to_string(),
            ));
        }

        let _guard = self.mutation.lock().await;

        // Re-registration keeps previously tracked signatures
        let sub = match self.store.get(subscriber_id).await? {
            Some(mut existing) => {
                existing.callback_url = callback_url.to_string();
                existing.shared_secret = shared_secret.to_string();
                existing
            }
            None => WebhookSubscription::new(
                subscriber_id.to_string(),
                callback_url.to_string(),
                shared_secret.to_string(),
            ),
        };

        self.store.upsert(&sub).await?;
        tracing::info!(
            target: "walletq::webhooks",
            subscriber_id = %subscriber_id,
            "webhook subscription registered"
        );
        Ok(())
    }

    /// Remove a subscription and everything it tracks
    pub async fn unsubscribe(&self, subscriber_id: &str) -> Result<bool, RegistryError> {
        let _guard = self.mutation.lock().await;

        let removed = self.store.delete(subscriber_id).await?;
        if removed {
            tracing::info!(
                target: "walletq::webhooks",
                subscriber_id = %subscriber_id,
                "webhook subscription removed"
            );
        }
        Ok(removed)
    }

    /// Start observing a signature for a subscriber
    ///
    /// A signature belongs to at most one subscriber; tracking it again
    /// under the same subscriber is a no-op.
    pub async fn track(&self, subscriber_id: &str, signature: &str) -> Result<(), RegistryError> {
        let _guard = self.mutation.lock().await;

        for other in self.store.get_all().await? {
            if other.subscriber_id != subscriber_id && other.is_tracking(signature) {
                return Err(RegistryError::AlreadyTracked(other.subscriber_id));
            }
        }

        let mut sub = self
            .store
            .get(subscriber_id)
            .await?
            .ok_or_else(|| RegistryError::UnknownSubscriber(subscriber_id.to_string()))?;

        sub.track(signature);
        self.store.upsert(&sub).await?;

        tracing::debug!(
            target: "walletq::webhooks",
            subscriber_id = %subscriber_id,
            signature = %signature,
            "signature tracked"
        );
        Ok(())
    }

    /// Stop observing a signature; returns whether it was tracked
    pub async fn untrack(&self, subscriber_id: &str, signature: &str) -> Result<bool, RegistryError> {
        let _guard = self.mutation.lock().await;

        let mut sub = self
            .store
            .get(subscriber_id)
            .await?
            .ok_or_else(|| RegistryError::UnknownSubscriber(subscriber_id.to_string()))?;

        let was_tracked = sub.untrack(signature);
        if was_tracked {
            self.store.upsert(&sub).await?;
        }
        Ok(was_tracked)
    }

    /// All current subscriptions
    pub async fn subscriptions(&self) -> Result<Vec<WebhookSubscription>, RegistryError> {
        Ok(self.store.get_all().await?)
    }

    /// Registry-wide stats
    pub async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let subs = self.store.get_all().await?;
        Ok(RegistryStats {
            subscriptions: subs.len() as u64,
            tracked_signatures: subs.iter().map(|s| s.tracked_signatures.len() as u64).sum(),
        })
    }

    /// Record a notification whose delivery attempts were exhausted
    pub async fn push_dead_letter(&self, letter: &DeadLetter) -> Result<(), RegistryError> {
        Ok(self.store.push_dead_letter(letter).await?)
    }

    /// All abandoned notifications
    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, RegistryError> {
        Ok(self.store.dead_letters().await?)
    }
}
