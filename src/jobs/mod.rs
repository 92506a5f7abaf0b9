//! Job Engine Module
//!
//! The asynchronous execution core: durable queue facade, bounded worker
//! pools, the two-phase confirmation protocol and the periodic stats
//! reporter.

pub mod confirm;
pub mod queue;
pub mod stats;
pub mod worker;

// Re-exports for convenience
pub use confirm::{confirm_signature, ConfirmOutcome};
pub use queue::{JobQueue, JobQueueError};
pub use stats::StatsReporter;
pub use worker::WorkerPool;
