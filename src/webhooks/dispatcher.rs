//! Notification Dispatcher
//!
//! Periodically scans every tracked signature, asks the ledger for its
//! authoritative status, and posts a signed notification to the
//! subscriber's callback once the signature reaches a terminal state.
//!
//! Delivery is at-most-sequence: up to the configured number of POST
//! attempts with exponential backoff, then the notification is abandoned
//! into the dead-letter table. Either way the signature is untracked, so
//! a terminal state produces exactly one delivery sequence.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::common::config::WalletqConfig;
use crate::ledger::{LedgerClient, SignatureStatus};
use crate::types::webhook::{DeadLetter, Notification, WebhookSubscription};
use crate::webhooks::registry::SubscriptionRegistry;
use crate::webhooks::sign::sign_payload;

/// Single-delivery errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("payload could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One webhook POST
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// POST `body` to `url` with the signature and attempt headers set
    async fn send(
        &self,
        url: &str,
        body: &[u8],
        signature: &str,
        attempt: u32,
    ) -> Result<(), DeliveryError>;
}

/// Production sender backed by a shared reqwest client
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new() -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeliveryError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NotificationSender for HttpSender {
    async fn send(
        &self,
        url: &str,
        body: &[u8],
        signature: &str,
        attempt: u32,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Signature", signature)
            .header("X-Attempt", attempt.to_string())
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Periodic scanner that turns terminal signatures into webhook deliveries
pub struct NotificationDispatcher {
    registry: Arc<SubscriptionRegistry>,
    ledger: Arc<dyn LedgerClient>,
    sender: Arc<dyn NotificationSender>,
    config: Arc<WalletqConfig>,
    running: Arc<RwLock<bool>>,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        ledger: Arc<dyn LedgerClient>,
        sender: Arc<dyn NotificationSender>,
        config: Arc<WalletqConfig>,
    ) -> Self {
        Self {
            registry,
            ledger,
            sender,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run the scan loop until `stop` is called
    pub async fn run(&self) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let interval = Duration::from_secs(self.config.dispatch_interval_secs);
        tracing::info!(
            target: "walletq::webhooks",
            interval_secs = self.config.dispatch_interval_secs,
            "notification dispatcher started"
        );

        loop {
            if !*self.running.read().await {
                break;
            }

            if let Err(e) = self.tick().await {
                tracing::error!(target: "walletq::webhooks", error = %e, "dispatch scan failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        tracing::info!(target: "walletq::webhooks", "notification dispatcher stopping");
    }

    /// One scan over every tracked signature
    pub async fn tick(&self) -> Result<(), crate::webhooks::registry::RegistryError> {
        for sub in self.registry.subscriptions().await? {
            for signature in sub.tracked_signatures.clone() {
                self.check_signature(&sub, &signature).await;
            }
        }
        Ok(())
    }

    async fn check_signature(&self, sub: &WebhookSubscription, signature: &str) {
        let status = match self.ledger.signature_status(signature).await {
            Ok(status) => status,
            Err(e) => {
                // Stays tracked; the next scan will ask again
                tracing::warn!(
                    target: "walletq::webhooks",
                    signature = %signature,
                    error = %e,
                    "status query failed during scan"
                );
                return;
            }
        };

        let notification = match status {
            SignatureStatus::Pending | SignatureStatus::Confirmed => return,
            SignatureStatus::Finalized => Notification::finalized(
                signature,
                self.config.network.explorer_tx_url(signature),
                &sub.subscriber_id,
            ),
            SignatureStatus::Errored(reason) => Notification::failed(
                signature,
                reason,
                self.config.network.explorer_tx_url(signature),
                &sub.subscriber_id,
            ),
        };

        self.deliver(sub, signature, &notification).await;

        // Untracked whether or not delivery succeeded: the sequence ran
        if let Err(e) = self.registry.untrack(&sub.subscriber_id, signature).await {
            tracing::error!(
                target: "walletq::webhooks",
                subscriber_id = %sub.subscriber_id,
                signature = %signature,
                error = %e,
                "untrack after delivery sequence failed"
            );
        }
    }

    /// Run one full delivery sequence for a notification
    async fn deliver(&self, sub: &WebhookSubscription, signature: &str, notification: &Notification) {
        let body = match serde_json::to_vec(notification) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    target: "walletq::webhooks",
                    signature = %signature,
                    error = %e,
                    "notification body could not be serialized"
                );
                return;
            }
        };
        let body_signature = sign_payload(&sub.shared_secret, &body);

        let max_attempts = self.config.webhook_max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self
                .sender
                .send(&sub.callback_url, &body, &body_signature, attempt)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        target: "walletq::webhooks",
                        subscriber_id = %sub.subscriber_id,
                        signature = %signature,
                        kind = %notification.kind,
                        attempt,
                        "notification delivered"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "walletq::webhooks",
                        subscriber_id = %sub.subscriber_id,
                        signature = %signature,
                        attempt,
                        max_attempts,
                        error = %e,
                        "delivery attempt failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_secs(1u64 << attempt.min(16))).await;
                    }
                }
            }
        }

        // Every attempt failed; keep the exact body for later inspection
        let payload = String::from_utf8_lossy(&body).into_owned();
        let letter = DeadLetter::new(&sub.subscriber_id, signature, payload, max_attempts);
        if let Err(e) = self.registry.push_dead_letter(&letter).await {
            tracing::error!(
                target: "walletq::webhooks",
                subscriber_id = %sub.subscriber_id,
                signature = %signature,
                error = %e,
                "dead letter could not be persisted"
            );
        }
        tracing::error!(
            target: "walletq::webhooks",
            subscriber_id = %sub.subscriber_id,
            signature = %signature,
            attempts = max_attempts,
            "notification abandoned after exhausting delivery attempts"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{Network, LAMPORTS_PER_SOL};
    use crate::ledger::MockLedgerClient;
    use crate::storage::MemoryStore;
    use std::sync::Mutex;

    fn test_config() -> Arc<WalletqConfig> {
        Arc::new(WalletqConfig {
            network: Network::Devnet,
            rpc_url: Network::Devnet.default_rpc().to_string(),
            db_path: ":memory:".to_string(),
            credit_workers: 5,
            transfer_workers: 3,
            default_max_attempts: 3,
            backoff_base_ms: 2000,
            worker_poll_ms: 500,
            credit_confirm_timeout_secs: 30,
            transfer_confirm_timeout_secs: 60,
            nominal_credit_lamports: LAMPORTS_PER_SOL,
            fallback_lamports: LAMPORTS_PER_SOL / 4,
            fallback_delay_ms: 5000,
            fallback_max_attempts: 2,
            fallback_backoff_base_ms: 3000,
            dispatch_interval_secs: 10,
            webhook_max_attempts: 3,
            stats_interval_secs: 120,
            log_level: "info".to_string(),
        })
    }

    async fn registry_with_tracked(signature: &str) -> Arc<SubscriptionRegistry> {
        let registry = Arc::new(SubscriptionRegistry::new(Arc::new(MemoryStore::new())));
        registry
            .subscribe("user1", "https://example.com/hook", "secret")
            .await
            .unwrap();
        registry.track("user1", signature).await.unwrap();
        registry
    }

    fn dispatcher(
        registry: Arc<SubscriptionRegistry>,
        ledger: MockLedgerClient,
        sender: MockNotificationSender,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(registry, Arc::new(ledger), Arc::new(sender), test_config())
    }

    #[tokio::test]
    async fn test_finalized_signature_is_delivered_and_untracked() {
        let registry = registry_with_tracked("sig1").await;

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_signature_status()
            .returning(|_| Ok(SignatureStatus::Finalized));

        let seen: Arc<Mutex<Vec<(String, Vec<u8>, String, u32)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut sender = MockNotificationSender::new();
        sender.expect_send().times(1).returning(
            move |url, body, signature, attempt| {
                seen_clone.lock().unwrap().push((
                    url.to_string(),
                    body.to_vec(),
                    signature.to_string(),
                    attempt,
                ));
                Ok(())
            },
        );

        let dispatcher = dispatcher(registry.clone(), ledger, sender);
        dispatcher.tick().await.unwrap();

        let deliveries = seen.lock().unwrap();
        let (url, body, body_signature, attempt) = &deliveries[0];
        assert_eq!(url, "https://example.com/hook");
        assert_eq!(*attempt, 1);
        // The signature covers the exact body bytes under the shared secret
        assert_eq!(*body_signature, sign_payload("secret", body));

        let parsed: Notification = serde_json::from_slice(body).unwrap();
        assert_eq!(parsed.kind, "transaction.finalized");
        assert_eq!(parsed.signature, "sig1");
        assert_eq!(parsed.subscriber_id, "user1");
        assert!(parsed.error.is_none());

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.tracked_signatures, 0);
    }

    #[tokio::test]
    async fn test_failed_signature_delivers_failure_payload() {
        let registry = registry_with_tracked("sig1").await;

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_signature_status()
            .returning(|_| Ok(SignatureStatus::Errored("InstructionError".to_string())));

        let seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut sender = MockNotificationSender::new();
        sender.expect_send().times(1).returning(move |_, body, _, _| {
            seen_clone.lock().unwrap().push(body.to_vec());
            Ok(())
        });

        let dispatcher = dispatcher(registry.clone(), ledger, sender);
        dispatcher.tick().await.unwrap();

        let parsed: Notification =
            serde_json::from_slice(&seen.lock().unwrap()[0]).unwrap();
        assert_eq!(parsed.kind, "transaction.failed");
        assert_eq!(parsed.error.as_deref(), Some("InstructionError"));
    }

    #[tokio::test]
    async fn test_pending_signature_stays_tracked() {
        let registry = registry_with_tracked("sig1").await;

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_signature_status()
            .returning(|_| Ok(SignatureStatus::Pending));

        let mut sender = MockNotificationSender::new();
        sender.expect_send().times(0);

        let dispatcher = dispatcher(registry.clone(), ledger, sender);
        dispatcher.tick().await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.tracked_signatures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_delivery_dead_letters_and_untracks() {
        let registry = registry_with_tracked("sig1").await;

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_signature_status()
            .returning(|_| Ok(SignatureStatus::Finalized));

        let mut sender = MockNotificationSender::new();
        sender
            .expect_send()
            .times(3)
            .returning(|_, _, _, _| Err(DeliveryError::Status(500)));

        let dispatcher = dispatcher(registry.clone(), ledger, sender);
        dispatcher.tick().await.unwrap();

        // Untracked even though every attempt failed
        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.tracked_signatures, 0);

        let letters = registry.dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].subscriber_id, "user1");
        assert_eq!(letters[0].signature, "sig1");
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].payload.contains("transaction.finalized"));
    }

    #[tokio::test]
    async fn test_transient_scan_error_keeps_tracking() {
        let registry = registry_with_tracked("sig1").await;

        let mut ledger = MockLedgerClient::new();
        ledger.expect_signature_status().returning(|_| {
            Err(crate::ledger::LedgerError::Transient("rpc down".to_string()))
        });

        let mut sender = MockNotificationSender::new();
        sender.expect_send().times(0);

        let dispatcher = dispatcher(registry.clone(), ledger, sender);
        dispatcher.tick().await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.tracked_signatures, 1);
    }

    #[tokio::test]
    async fn test_delivery_retries_until_success() {
        let registry = registry_with_tracked("sig1").await;

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_signature_status()
            .returning(|_| Ok(SignatureStatus::Finalized));

        let attempts: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let attempts_clone = attempts.clone();
        let mut sender = MockNotificationSender::new();
        sender
            .expect_send()
            .times(2)
            .returning(move |_, _, _, attempt| {
                attempts_clone.lock().unwrap().push(attempt);
                if attempt == 1 {
                    Err(DeliveryError::Request("connection refused".to_string()))
                } else {
                    Ok(())
                }
            });

        let dispatcher = dispatcher(registry.clone(), ledger, sender);
        tokio::time::pause();
        dispatcher.tick().await.unwrap();

        assert_eq!(*attempts.lock().unwrap(), vec![1, 2]);
        assert!(registry.dead_letters().await.unwrap().is_empty());
        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.tracked_signatures, 0);
    }
}
