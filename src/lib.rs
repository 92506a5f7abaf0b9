//! walletq - Asynchronous Money-Movement Backend
//!
//! Durable job pipeline for Solana money movement. Clients enqueue credit
//! and transfer jobs and get an id back immediately; bounded worker pools
//! execute them against the ledger with retries, exponential backoff and a
//! reduced-amount fallback chain for exhausted nominal credits.
//!
//! ## Services
//!
//! 1. **Worker Pools** - Drain the credit and transfer queues (bounded concurrency)
//! 2. **Notification Dispatcher** - Watches tracked signatures and delivers
//!    signed webhooks once they reach a terminal ledger state
//! 3. **Stats Reporter** - Periodic per-queue count logging
//!
//! Job state survives restarts in SQLite; jobs left active by a crashed
//! process are requeued at startup (execution is at-least-once).

pub mod common;
pub mod jobs;
pub mod ledger;
pub mod storage;
pub mod types;
pub mod webhooks;

// Re-exports: configuration & errors
pub use common::config::{Network, WalletqConfig, LAMPORTS_PER_SOL};
pub use common::error::WalletqError;

// Re-exports: job engine
pub use jobs::{ConfirmOutcome, JobQueue, JobQueueError, StatsReporter, WorkerPool};

// Re-exports: ledger client
pub use ledger::{LedgerClient, LedgerError, SignatureStatus, SolanaLedger};

// Re-exports: storage
pub use storage::{JobStore, MemoryStore, SqliteStore, StorageError, SubscriptionStore};

// Re-exports: job types
pub use types::job::{Job, JobKind, JobPayload, JobState, JobStatusResponse, QueueCounts};

// Re-exports: webhooks
pub use webhooks::{
    HttpSender, NotificationDispatcher, NotificationSender, RegistryError, SubscriptionRegistry,
};

/// Lamport conversion helpers
pub mod units {
    pub use crate::common::config::LAMPORTS_PER_SOL;

    /// Convert SOL to lamports with proper rounding
    pub fn sol_to_lamports(sol: f64) -> u64 {
        (sol * LAMPORTS_PER_SOL as f64).round() as u64
    }

    pub fn lamports_to_sol(lamports: u64) -> f64 {
        lamports as f64 / LAMPORTS_PER_SOL as f64
    }

    pub fn format_lamports(lamports: u64) -> String {
        format!("{} lamports ({:.9} SOL)", lamports, lamports_to_sol(lamports))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_conversions() {
            assert_eq!(sol_to_lamports(1.0), LAMPORTS_PER_SOL);
            assert_eq!(sol_to_lamports(0.25), 250_000_000);
            assert_eq!(lamports_to_sol(500_000_000), 0.5);
        }
    }
}
