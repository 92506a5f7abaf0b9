//! Queue Statistics Reporter
//!
//! Periodically logs per-queue job counts so operators can watch backlog
//! and failure trends without querying the database.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::common::config::WalletqConfig;
use crate::storage::JobStore;
use crate::types::job::JobKind;

pub struct StatsReporter {
    store: Arc<dyn JobStore>,
    config: Arc<WalletqConfig>,
    running: Arc<RwLock<bool>>,
}

impl StatsReporter {
    pub fn new(store: Arc<dyn JobStore>, config: Arc<WalletqConfig>) -> Self {
        Self {
            store,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run the reporter loop until `stop` is called
    pub async fn run(&self) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let interval = Duration::from_secs(self.config.stats_interval_secs);
        tracing::info!(
            target: "walletq::jobs",
            interval_secs = self.config.stats_interval_secs,
            "stats reporter started"
        );

        loop {
            if !*self.running.read().await {
                break;
            }

            self.report().await;
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    async fn report(&self) {
        for kind in [JobKind::Credit, JobKind::Transfer] {
            match self.store.counts(kind).await {
                Ok(counts) => {
                    tracing::info!(
                        target: "walletq::jobs",
                        queue = %kind,
                        waiting = counts.waiting,
                        active = counts.active,
                        completed = counts.completed,
                        failed = counts.failed,
                        total = counts.total(),
                        "queue stats"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        target: "walletq::jobs",
                        queue = %kind,
                        error = %e,
                        "stats query failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{Network, LAMPORTS_PER_SOL};
    use crate::storage::MemoryStore;
    use crate::types::job::{Job, JobPayload};

    #[tokio::test]
    async fn test_report_survives_empty_store() {
        let config = WalletqConfig {
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
        };

        let store = Arc::new(MemoryStore::new());
        store
            .insert(&Job::new(
                JobPayload::Credit {
                    recipient: "r".to_string(),
                    lamports: 1,
                },
                3,
                2000,
                0,
            ))
            .await
            .unwrap();

        let reporter = StatsReporter::new(store, Arc::new(config));
        reporter.report().await;
    }
}
