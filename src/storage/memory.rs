//! In-Memory Storage Implementations
//!
//! Provides in-memory storage for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{JobStore, StorageError, StorageResult, SubscriptionStore};
use crate::types::job::{Job, JobKind, JobState, QueueCounts};
use crate::types::webhook::{DeadLetter, WebhookSubscription};

/// In-memory store implementing both storage traits
///
/// Thread-safe; claim exclusivity comes from holding the write lock for
/// the whole select-and-transition step.
#[derive(Clone, Default)]
pub struct MemoryStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    subscriptions: Arc<RwLock<HashMap<String, WebhookSubscription>>>,
    dead_letters: Arc<RwLock<Vec<DeadLetter>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: &Job) -> StorageResult<()> {
        let mut jobs = self.jobs.write().await;

        if jobs.contains_key(&job.id) {
            return Err(StorageError::Duplicate(job.id.clone()));
        }

        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update(&self, job: &Job) -> StorageResult<()> {
        let mut jobs = self.jobs.write().await;

        match jobs.get(&job.id) {
            None => Err(StorageError::NotFound(job.id.clone())),
            Some(stored) if stored.is_terminal() => Err(StorageError::Terminal(job.id.clone())),
            Some(_) => {
                jobs.insert(job.id.clone(), job.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn claim_next(&self, kind: JobKind, now_ms: i64) -> StorageResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;

        let id = jobs
            .values()
            .filter(|j| j.kind == kind && j.state == JobState::Waiting && j.run_at <= now_ms)
            .min_by_key(|j| (j.created_at, j.id.clone()))
            .map(|j| j.id.clone());

        let id = match id {
            Some(id) => id,
            None => return Ok(None),
        };

        let job = jobs.get_mut(&id).ok_or_else(|| StorageError::NotFound(id.clone()))?;
        job.mark_active();
        Ok(Some(job.clone()))
    }

    async fn list_by_states(&self, states: &[JobState]) -> StorageResult<Vec<Job>> {
        let jobs = self.jobs.read().await;

        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| states.contains(&j.state))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matched)
    }

    async fn counts(&self, kind: JobKind) -> StorageResult<QueueCounts> {
        let jobs = self.jobs.read().await;

        let mut counts = QueueCounts::default();
        for job in jobs.values().filter(|j| j.kind == kind) {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed | JobState::FallbackQueued => counts.failed += 1,
            }
        }

        Ok(counts)
    }

    async fn requeue_orphaned(&self, now_ms: i64) -> StorageResult<u64> {
        let mut jobs = self.jobs.write().await;

        let mut requeued = 0;
        for job in jobs.values_mut() {
            if job.state == JobState::Active {
                job.state = JobState::Waiting;
                // The next claim re-increments; give the interrupted
                // attempt back so the budget is not over-consumed
                job.attempts_made = job.attempts_made.saturating_sub(1);
                job.run_at = now_ms;
                job.updated_at = now_ms;
                requeued += 1;
            }
        }

        Ok(requeued)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn upsert(&self, sub: &WebhookSubscription) -> StorageResult<()> {
        self.subscriptions
            .write()
            .await
            .insert(sub.subscriber_id.clone(), sub.clone());
        Ok(())
    }

    async fn delete(&self, subscriber_id: &str) -> StorageResult<bool> {
        Ok(self
            .subscriptions
            .write()
            .await
            .remove(subscriber_id)
            .is_some())
    }

    async fn get(&self, subscriber_id: &str) -> StorageResult<Option<WebhookSubscription>> {
        Ok(self.subscriptions.read().await.get(subscriber_id).cloned())
    }

    async fn get_all(&self) -> StorageResult<Vec<WebhookSubscription>> {
        let subs = self.subscriptions.read().await;
        let mut all: Vec<WebhookSubscription> = subs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn push_dead_letter(&self, letter: &DeadLetter) -> StorageResult<()> {
        self.dead_letters.write().await.push(letter.clone());
        Ok(())
    }

    async fn dead_letters(&self) -> StorageResult<Vec<DeadLetter>> {
        Ok(self.dead_letters.read().await.clone())
    }
}
