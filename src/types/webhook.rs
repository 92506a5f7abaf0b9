//! Webhook Types
//!
//! Subscription records, outbound notification payloads, and the
//! dead-letter record kept when a delivery sequence is exhausted.

use serde::{Deserialize, Serialize};

use super::job::now_ms;

/// A subscriber's webhook registration and its tracked signatures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Subscriber identity (one subscription per subscriber)
    pub subscriber_id: String,
    /// Delivery target
    pub callback_url: String,
    /// Shared secret used to sign delivery bodies
    pub shared_secret: String,
    /// Signatures under active observation
    pub tracked_signatures: Vec<String>,
    /// Timestamp when the subscription was created (unix millis)
    pub created_at: i64,
    /// Timestamp of the last mutation
    pub last_used: i64,
}

impl WebhookSubscription {
    pub fn new(subscriber_id: String, callback_url: String, shared_secret: String) -> Self {
        let now = now_ms();
        Self {
            subscriber_id,
            callback_url,
            shared_secret,
            tracked_signatures: Vec::new(),
            created_at: now,
            last_used: now,
        }
    }

    /// Add a signature to the tracked set (idempotent)
    pub fn track(&mut self, signature: &str) {
        if !self.tracked_signatures.iter().any(|s| s == signature) {
            self.tracked_signatures.push(signature.to_string());
        }
        self.last_used = now_ms();
    }

    /// Remove a signature from the tracked set; returns whether it was present
    pub fn untrack(&mut self, signature: &str) -> bool {
        let before = self.tracked_signatures.len();
        self.tracked_signatures.retain(|s| s != signature);
        self.last_used = now_ms();
        self.tracked_signatures.len() != before
    }

    pub fn is_tracking(&self, signature: &str) -> bool {
        self.tracked_signatures.iter().any(|s| s == signature)
    }
}

/// Outbound webhook payload
///
/// Field names follow the subscriber-facing wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub signature: String,
    pub status: String,
    pub timestamp: String,
    pub reference_url: String,
    pub subscriber_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Notification {
    /// Payload for a signature the ledger reports finalized
    pub fn finalized(signature: &str, reference_url: String, subscriber_id: &str) -> Self {
        Self {
            kind: "transaction.finalized".to_string(),
            signature: signature.to_string(),
            status: "finalized".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            reference_url,
            subscriber_id: subscriber_id.to_string(),
            error: None,
        }
    }

    /// Payload for a signature the ledger reports errored
    pub fn failed(
        signature: &str,
        error: String,
        reference_url: String,
        subscriber_id: &str,
    ) -> Self {
        Self {
            kind: "transaction.failed".to_string(),
            signature: signature.to_string(),
            status: "failed".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            reference_url,
            subscriber_id: subscriber_id.to_string(),
            error: Some(error),
        }
    }
}

/// Record of a notification whose delivery attempts were all exhausted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub subscriber_id: String,
    pub signature: String,
    /// The exact JSON body that failed to deliver
    pub payload: String,
    /// Delivery attempts made before abandonment
    pub attempts: u32,
    pub created_at: i64,
}

impl DeadLetter {
    pub fn new(subscriber_id: &str, signature: &str, payload: String, attempts: u32) -> Self {
        Self {
            subscriber_id: subscriber_id.to_string(),
            signature: signature.to_string(),
            payload,
            attempts,
            created_at: now_ms(),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RegistryStats {
    pub subscriptions: u64,
    pub tracked_signatures: u64,
}

impl std::fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Webhooks: {} subscriptions | {} tracked signatures",
            self.subscriptions, self.tracked_signatures
        )
    }
}
