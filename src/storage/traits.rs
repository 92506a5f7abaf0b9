//! Storage Trait Definitions
//!
//! Defines abstract storage interfaces for jobs and webhook subscriptions.
//! Implementations can use SQLite (production) or in-memory (testing).

use async_trait::async_trait;
use thiserror::Error;

use crate::types::job::{Job, JobKind, JobState, QueueCounts};
use crate::types::webhook::{DeadLetter, WebhookSubscription};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("job is terminal: {0}")]
    Terminal(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable job queue interface
///
/// Implementations:
/// - `SqliteStore` - Production storage, survives restarts
/// - `MemoryStore` - In-memory storage for testing
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record
    async fn insert(&self, job: &Job) -> StorageResult<()>;

    /// Update an existing job record
    ///
    /// Rejected with `StorageError::Terminal` when the stored record is
    /// already in a terminal state.
    async fn update(&self, job: &Job) -> StorageResult<()>;

    /// Get a job by ID
    async fn get(&self, id: &str) -> StorageResult<Option<Job>>;

    /// Claim the oldest eligible waiting job of the given kind
    ///
    /// The waiting → active transition is exclusive: concurrent callers
    /// never receive the same job. Claiming increments `attempts_made`,
    /// resets progress and stamps `started_at`.
    async fn claim_next(&self, kind: JobKind, now_ms: i64) -> StorageResult<Option<Job>>;

    /// List jobs in any of the given states
    async fn list_by_states(&self, states: &[JobState]) -> StorageResult<Vec<Job>>;

    /// Per-state counts for one queue kind
    async fn counts(&self, kind: JobKind) -> StorageResult<QueueCounts>;

    /// Requeue jobs left active by a crashed process
    ///
    /// Returns the number of requeued jobs. The interrupted attempt is
    /// handed back (its `attempts_made` increment is undone) so that
    /// re-claiming it keeps `attempts_made <= max_attempts`. Because
    /// ledger submission is not idempotent, a requeued attempt may
    /// duplicate an on-chain operation: execution is at-least-once.
    async fn requeue_orphaned(&self, now_ms: i64) -> StorageResult<u64>;
}

/// Durable webhook subscription interface
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace a subscription
    async fn upsert(&self, sub: &WebhookSubscription) -> StorageResult<()>;

    /// Delete a subscription; returns whether it existed
    async fn delete(&self, subscriber_id: &str) -> StorageResult<bool>;

    /// Get a subscription by subscriber ID
    async fn get(&self, subscriber_id: &str) -> StorageResult<Option<WebhookSubscription>>;

    /// Get all subscriptions
    async fn get_all(&self) -> StorageResult<Vec<WebhookSubscription>>;

    /// Persist a notification whose delivery attempts were exhausted
    async fn push_dead_letter(&self, letter: &DeadLetter) -> StorageResult<()>;

    /// Get all dead letters
    async fn dead_letters(&self) -> StorageResult<Vec<DeadLetter>>;
}
