//! Worker Pool
//!
//! Bounded pools of workers drain the credit and transfer queues. Each
//! worker loops claim → execute → settle; the claim is exclusive, so the
//! pool size is the hard concurrency bound per queue.
//!
//! One attempt runs submit then two-phase confirmation, reporting progress
//! checkpoints along the way. Transient failures consume the attempt and
//! reschedule with exponential backoff; definitive failures end the job at
//! once. A nominal credit job that exhausts its budget on transient
//! failures gets exactly one reduced-amount fallback child.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::common::config::WalletqConfig;
use crate::jobs::confirm::{confirm_signature, ConfirmOutcome};
use crate::ledger::{LedgerClient, LedgerError};
use crate::storage::{JobStore, StorageError};
use crate::types::job::{now_ms, Job, JobKind, JobPayload};

/// Bounded worker pools for both job queues
#[derive(Clone)]
pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    ledger: Arc<dyn LedgerClient>,
    config: Arc<WalletqConfig>,
    running: Arc<RwLock<bool>>,
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn JobStore>,
        ledger: Arc<dyn LedgerClient>,
        config: Arc<WalletqConfig>,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Spawn all workers; returns their join handles
    pub async fn spawn(&self) -> Vec<JoinHandle<()>> {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let mut handles = Vec::new();
        for i in 0..self.config.credit_workers {
            let pool = self.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(JobKind::Credit, i).await;
            }));
        }
        for i in 0..self.config.transfer_workers {
            let pool = self.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(JobKind::Transfer, i).await;
            }));
        }

        tracing::info!(
            target: "walletq::jobs",
            credit_workers = self.config.credit_workers,
            transfer_workers = self.config.transfer_workers,
            "worker pools started"
        );
        handles
    }

    /// Signal all workers to stop after their current attempt
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        tracing::info!(target: "walletq::jobs", "worker pools stopping");
    }

    async fn worker_loop(&self, kind: JobKind, worker_idx: usize) {
        loop {
            if !*self.running.read().await {
                break;
            }

            let claimed = match self.store.claim_next(kind, now_ms()).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(
                        target: "walletq::jobs",
                        queue = %kind,
                        worker = worker_idx,
                        error = %e,
                        "claim failed"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.worker_poll_ms)).await;
                    continue;
                }
            };

            match claimed {
                Some(job) => {
                    if let Err(e) = self.execute(job).await {
                        tracing::error!(
                            target: "walletq::jobs",
                            queue = %kind,
                            worker = worker_idx,
                            error = %e,
                            "attempt could not be settled"
                        );
                    }
                }
                None => {
                    tokio::time::sleep(Duration::from_millis(self.config.worker_poll_ms)).await;
                }
            }
        }
    }

    /// Run one attempt of a claimed job to a settled state
    pub async fn execute(&self, mut job: Job) -> Result<(), StorageError> {
        tracing::info!(
            target: "walletq::jobs",
            job_id = %job.id,
            queue = %job.kind,
            attempt = job.attempts_made,
            max_attempts = job.max_attempts,
            "attempt started"
        );

        job.set_progress(10);
        self.store.update(&job).await?;

        let submitted = match &job.payload {
            JobPayload::Credit { recipient, lamports } => {
                self.ledger.request_credit(recipient, *lamports).await
            }
            JobPayload::Transfer {
                from_secret_b64,
                recipient,
                lamports,
            } => {
                self.ledger
                    .submit_transfer(from_secret_b64, recipient, *lamports)
                    .await
            }
        };

        let signature = match submitted {
            Ok(signature) => signature,
            Err(LedgerError::Definitive(reason)) => {
                return self.fail(job, format!("submission rejected: {}", reason)).await;
            }
            Err(LedgerError::Transient(reason)) => {
                return self
                    .retry_or_exhaust(job, format!("submission failed: {}", reason))
                    .await;
            }
        };

        job.signature = Some(signature.clone());
        job.set_progress(60);
        self.store.update(&job).await?;

        let timeout = match job.kind {
            JobKind::Credit => Duration::from_secs(self.config.credit_confirm_timeout_secs),
            JobKind::Transfer => Duration::from_secs(self.config.transfer_confirm_timeout_secs),
        };

        match confirm_signature(self.ledger.as_ref(), &signature, timeout).await {
            Ok(ConfirmOutcome::Succeeded(status)) => {
                job.set_progress(90);
                self.store.update(&job).await?;

                let explorer_url = self.config.network.explorer_tx_url(&signature);
                job.mark_completed(signature.clone(), explorer_url);
                self.store.update(&job).await?;

                tracing::info!(
                    target: "walletq::jobs",
                    job_id = %job.id,
                    signature = %signature,
                    status = ?status,
                    "job completed"
                );
                Ok(())
            }
            Ok(ConfirmOutcome::StillPending) => {
                self.retry_or_exhaust(job, "transaction not yet visible on the ledger".to_string())
                    .await
            }
            Ok(ConfirmOutcome::Errored(reason)) => {
                self.fail(job, format!("transaction failed on-chain: {}", reason))
                    .await
            }
            Err(LedgerError::Definitive(reason)) => {
                self.fail(job, format!("status query rejected: {}", reason))
                    .await
            }
            Err(LedgerError::Transient(reason)) => {
                self.retry_or_exhaust(job, format!("status query failed: {}", reason))
                    .await
            }
        }
    }

    /// Settle a transient failure: reschedule, or end the budget
    async fn retry_or_exhaust(&self, mut job: Job, reason: String) -> Result<(), StorageError> {
        if job.can_retry() {
            job.mark_retrying(reason.clone());
            self.store.update(&job).await?;

            tracing::warn!(
                target: "walletq::jobs",
                job_id = %job.id,
                attempt = job.attempts_made,
                max_attempts = job.max_attempts,
                retry_in_ms = job.backoff_delay_ms(),
                reason = %reason,
                "attempt failed, retry scheduled"
            );
            return Ok(());
        }

        if self.fallback_eligible(&job) {
            let child = Job::fallback_for(
                &job,
                self.config.fallback_lamports,
                self.config.fallback_max_attempts,
                self.config.fallback_backoff_base_ms,
                self.config.fallback_delay_ms,
            );
            self.store.insert(&child).await?;

            job.mark_fallback_queued(child.id.clone(), reason.clone());
            self.store.update(&job).await?;

            tracing::warn!(
                target: "walletq::jobs",
                job_id = %job.id,
                fallback_job_id = %child.id,
                fallback_lamports = self.config.fallback_lamports,
                reason = %reason,
                "attempts exhausted, reduced-amount fallback enqueued"
            );
            return Ok(());
        }

        self.fail(job, format!("attempts exhausted: {}", reason)).await
    }

    async fn fail(&self, mut job: Job, reason: String) -> Result<(), StorageError> {
        job.mark_failed(reason.clone());
        self.store.update(&job).await?;

        tracing::error!(
            target: "walletq::jobs",
            job_id = %job.id,
            queue = %job.kind,
            attempt = job.attempts_made,
            reason = %reason,
            "job failed"
        );
        Ok(())
    }

    /// Only a nominal-amount credit job that is not itself a fallback
    /// qualifies for the fallback chain; the chain is one level deep.
    fn fallback_eligible(&self, job: &Job) -> bool {
        job.kind == JobKind::Credit
            && job.caused_by.is_none()
            && job.payload.lamports() == self.config.nominal_credit_lamports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{Network, LAMPORTS_PER_SOL};
    use crate::ledger::{MockLedgerClient, SignatureStatus};
    use crate::storage::MemoryStore;
    use crate::types::job::JobState;

    fn test_config() -> WalletqConfig {
        WalletqConfig {
            network: Network::Devnet,
            rpc_url: Network::Devnet.default_rpc().to_string(),
            db_path: ":memory:".to_string(),
            credit_workers: 5,
            transfer_workers: 3,
            default_max_attempts: 3,
            backoff_base_ms: 2000,
            worker_poll_ms: 10,
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
        }
    }

    fn pool_with(
        store: Arc<MemoryStore>,
        ledger: MockLedgerClient,
        config: WalletqConfig,
    ) -> WorkerPool {
        WorkerPool::new(store, Arc::new(ledger), Arc::new(config))
    }

    async fn claim(store: &MemoryStore, kind: JobKind) -> Job {
        store.claim_next(kind, now_ms()).await.unwrap().unwrap()
    }

    fn nominal_credit(config: &WalletqConfig) -> Job {
        Job::new(
            JobPayload::Credit {
                recipient: "recipient".to_string(),
                lamports: config.nominal_credit_lamports,
            },
            config.default_max_attempts,
            config.backoff_base_ms,
            0,
        )
    }

    #[tokio::test]
    async fn test_successful_credit_attempt() {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let job = nominal_credit(&config);
        store.insert(&job).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_request_credit()
            .times(1)
            .returning(|_, _| Ok("sig123".to_string()));
        ledger.expect_await_confirmation().returning(|_| Ok(()));
        ledger
            .expect_signature_status()
            .times(1)
            .returning(|_| Ok(SignatureStatus::Finalized));

        let pool = pool_with(store.clone(), ledger, config);
        let claimed = claim(&store, JobKind::Credit).await;
        pool.execute(claimed).await.unwrap();

        let settled = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.state, JobState::Completed);
        assert_eq!(settled.progress, 100);
        assert_eq!(settled.signature.as_deref(), Some("sig123"));
        assert_eq!(
            settled.explorer_url.as_deref(),
            Some("https://explorer.solana.com/tx/sig123?cluster=devnet")
        );
        assert!(settled.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_transient_submission_failure_schedules_retry() {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let job = nominal_credit(&config);
        store.insert(&job).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_request_credit()
            .times(1)
            .returning(|_, _| Err(LedgerError::Transient("rpc timeout".to_string())));

        let pool = pool_with(store.clone(), ledger, config);
        let claimed = claim(&store, JobKind::Credit).await;
        pool.execute(claimed).await.unwrap();

        let settled = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.state, JobState::Waiting);
        assert_eq!(settled.attempts_made, 1);
        assert!(settled.run_at > now_ms());
        assert!(settled
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("rpc timeout"));
    }

    #[tokio::test]
    async fn test_definitive_failure_ends_job_immediately() {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let job = Job::new(
            JobPayload::Transfer {
                from_secret_b64: "bad".to_string(),
                recipient: "recipient".to_string(),
                lamports: 100,
            },
            3,
            2000,
            0,
        );
        store.insert(&job).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_submit_transfer()
            .times(1)
            .returning(|_, _, _| Err(LedgerError::Definitive("invalid key material".to_string())));

        let pool = pool_with(store.clone(), ledger, config);
        let claimed = claim(&store, JobKind::Transfer).await;
        pool.execute(claimed).await.unwrap();

        let settled = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.state, JobState::Failed);
        assert_eq!(settled.attempts_made, 1);
        assert!(settled.fallback_job_id.is_none());
    }

    #[tokio::test]
    async fn test_pending_confirmation_consumes_attempt() {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let job = nominal_credit(&config);
        store.insert(&job).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_request_credit()
            .returning(|_, _| Ok("sig123".to_string()));
        ledger.expect_await_confirmation().returning(|_| Ok(()));
        ledger
            .expect_signature_status()
            .returning(|_| Ok(SignatureStatus::Pending));

        let pool = pool_with(store.clone(), ledger, config);
        let claimed = claim(&store, JobKind::Credit).await;
        pool.execute(claimed).await.unwrap();

        let settled = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.state, JobState::Waiting);
        assert_eq!(settled.attempts_made, 1);
        // The signature from the unconfirmed attempt stays recorded
        assert_eq!(settled.signature.as_deref(), Some("sig123"));
    }

    #[tokio::test]
    async fn test_exhausted_nominal_credit_enqueues_fallback() {
        let store = Arc::new(MemoryStore::new());
        let mut config = test_config();
        config.default_max_attempts = 1;
        let job = Job::new(
            JobPayload::Credit {
                recipient: "recipient".to_string(),
                lamports: config.nominal_credit_lamports,
            },
            1,
            config.backoff_base_ms,
            0,
        );
        store.insert(&job).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_request_credit()
            .returning(|_, _| Err(LedgerError::Transient("faucet dry".to_string())));

        let pool = pool_with(store.clone(), ledger, config.clone());
        let claimed = claim(&store, JobKind::Credit).await;
        pool.execute(claimed).await.unwrap();

        let parent = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(parent.state, JobState::FallbackQueued);
        let child_id = parent.fallback_job_id.clone().unwrap();

        let child = store.get(&child_id).await.unwrap().unwrap();
        assert_eq!(child.state, JobState::Waiting);
        assert_eq!(child.payload.lamports(), config.fallback_lamports);
        assert_eq!(child.caused_by.as_deref(), Some(job.id.as_str()));
        assert_eq!(child.max_attempts, config.fallback_max_attempts);
        assert!(child.run_at >= child.created_at + config.fallback_delay_ms as i64);
    }

    #[tokio::test]
    async fn test_fallback_child_never_chains_again() {
        let store = Arc::new(MemoryStore::new());
        let mut config = test_config();
        config.fallback_max_attempts = 1;

        let parent = nominal_credit(&config);
        let child = Job::fallback_for(&parent, config.fallback_lamports, 1, 3000, 0);
        store.insert(&child).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_request_credit()
            .returning(|_, _| Err(LedgerError::Transient("faucet dry".to_string())));

        let pool = pool_with(store.clone(), ledger, config);
        let claimed = claim(&store, JobKind::Credit).await;
        pool.execute(claimed).await.unwrap();

        let settled = store.get(&child.id).await.unwrap().unwrap();
        assert_eq!(settled.state, JobState::Failed);
        assert!(settled.fallback_job_id.is_none());
    }

    #[tokio::test]
    async fn test_non_nominal_credit_gets_no_fallback() {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let job = Job::new(
            JobPayload::Credit {
                recipient: "recipient".to_string(),
                lamports: 12345,
            },
            1,
            config.backoff_base_ms,
            0,
        );
        store.insert(&job).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_request_credit()
            .returning(|_, _| Err(LedgerError::Transient("faucet dry".to_string())));

        let pool = pool_with(store.clone(), ledger, config);
        let claimed = claim(&store, JobKind::Credit).await;
        pool.execute(claimed).await.unwrap();

        let settled = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.state, JobState::Failed);
        assert!(settled.fallback_job_id.is_none());
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let job = nominal_credit(&config);
        store.insert(&job).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_request_credit()
            .times(2)
            .returning(|_, _| Err(LedgerError::Transient("rpc timeout".to_string())));
        ledger
            .expect_request_credit()
            .times(1)
            .returning(|_, _| Ok("sig123".to_string()));
        ledger.expect_await_confirmation().returning(|_| Ok(()));
        ledger
            .expect_signature_status()
            .returning(|_| Ok(SignatureStatus::Finalized));

        let pool = pool_with(store.clone(), ledger, config);

        // Claim past the backoff delays instead of sleeping through them
        let far_future = now_ms() + 60_000;
        for _ in 0..3 {
            let claimed = store
                .claim_next(JobKind::Credit, far_future)
                .await
                .unwrap()
                .unwrap();
            pool.execute(claimed).await.unwrap();
        }

        let settled = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(settled.state, JobState::Completed);
        assert_eq!(settled.attempts_made, 3);
        assert_eq!(settled.signature.as_deref(), Some("sig123"));
    }

    #[tokio::test]
    async fn test_stop_halts_workers() {
        let store = Arc::new(MemoryStore::new());
        let ledger = MockLedgerClient::new();
        let pool = Arc::new(pool_with(store, ledger, test_config()));

        let handles = pool.spawn().await;
        assert_eq!(handles.len(), 8);

        pool.stop().await;
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
