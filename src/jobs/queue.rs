//! Job Queue Facade
//!
//! Submission boundary for money-movement jobs. Validates inputs,
//! persists the job in the waiting state and returns its id; workers pick
//! the job up independently. Also exposes the read side: status lookup,
//! listing and per-queue counts.

use std::sync::Arc;
use thiserror::Error;

use crate::common::config::WalletqConfig;
use crate::storage::{JobStore, StorageError};
use crate::types::job::{
    now_ms, Job, JobKind, JobPayload, JobState, JobStatusResponse, QueueCounts,
};

/// Queue boundary errors
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("invalid job input: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Submission and read facade over the durable job store
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    config: Arc<WalletqConfig>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, config: Arc<WalletqConfig>) -> Self {
        Self { store, config }
    }

    /// Enqueue a credit job; returns the job id immediately
    pub async fn enqueue_credit(
        &self,
        recipient: &str,
        lamports: u64,
    ) -> Result<String, JobQueueError> {
        validate_recipient(recipient)?;
        validate_amount(lamports)?;

        let job = Job::new(
            JobPayload::Credit {
                recipient: recipient.to_string(),
                lamports,
            },
            self.config.default_max_attempts,
            self.config.backoff_base_ms,
            0,
        );

        self.store.insert(&job).await?;
        tracing::info!(
            target: "walletq::jobs",
            job_id = %job.id,
            lamports,
            "credit job enqueued"
        );
        Ok(job.id)
    }

    /// Enqueue a transfer job; returns the job id immediately
    pub async fn enqueue_transfer(
        &self,
        from_secret_b64: &str,
        recipient: &str,
        lamports: u64,
    ) -> Result<String, JobQueueError> {
        if from_secret_b64.is_empty() {
            return Err(JobQueueError::Validation(
                "source key material is required".to_string(),
            ));
        }
        validate_recipient(recipient)?;
        validate_amount(lamports)?;

        let job = Job::new(
            JobPayload::Transfer {
                from_secret_b64: from_secret_b64.to_string(),
                recipient: recipient.to_string(),
                lamports,
            },
            self.config.default_max_attempts,
            self.config.backoff_base_ms,
            0,
        );

        self.store.insert(&job).await?;
        tracing::info!(
            target: "walletq::jobs",
            job_id = %job.id,
            lamports,
            "transfer job enqueued"
        );
        Ok(job.id)
    }

    /// Look up a job by id
    pub async fn get_job(&self, id: &str) -> Result<Option<Job>, JobQueueError> {
        Ok(self.store.get(id).await?)
    }

    /// Boundary status view of a job, shaped for the HTTP layer
    pub async fn job_status(&self, id: &str) -> Result<Option<JobStatusResponse>, JobQueueError> {
        Ok(self
            .store
            .get(id)
            .await?
            .map(|job| JobStatusResponse::from(&job)))
    }

    /// List jobs in any of the given states
    pub async fn list_jobs(&self, states: &[JobState]) -> Result<Vec<Job>, JobQueueError> {
        Ok(self.store.list_by_states(states).await?)
    }

    /// Per-state counts for one queue
    pub async fn queue_counts(&self, kind: JobKind) -> Result<QueueCounts, JobQueueError> {
        Ok(self.store.counts(kind).await?)
    }

    /// Requeue jobs left active by a previous process
    ///
    /// Run once at startup, before workers spawn. Execution is
    /// at-least-once: a requeued job may repeat a ledger submission.
    pub async fn recover_orphaned(&self) -> Result<u64, JobQueueError> {
        let requeued = self.store.requeue_orphaned(now_ms()).await?;
        if requeued > 0 {
            tracing::warn!(
                target: "walletq::jobs",
                requeued,
                "requeued jobs orphaned by a previous process"
            );
        }
        Ok(requeued)
    }
}

fn validate_recipient(recipient: &str) -> Result<(), JobQueueError> {
    if recipient.trim().is_empty() {
        return Err(JobQueueError::Validation(
            "recipient is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_amount(lamports: u64) -> Result<(), JobQueueError> {
    if lamports == 0 {
        return Err(JobQueueError::Validation(
            "amount must be positive".to_string(),
        ));
    }
    Ok(())
}
