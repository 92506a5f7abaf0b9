//! Shared Types Module
//!
//! Data types shared across the walletq backend.

pub mod job;
pub mod webhook;

// Re-exports for convenience
pub use job::{now_ms, Job, JobKind, JobPayload, JobState, JobStatusResponse, QueueCounts};
pub use webhook::{DeadLetter, Notification, RegistryStats, WebhookSubscription};
