//! Two-Phase Confirmation
//!
//! Phase one races the ledger's own confirmation wait against a wall-clock
//! deadline, because that wait can hang well past any useful bound. Phase
//! two issues exactly one authoritative status query and decides from its
//! answer alone. Winning or losing the race carries no authority: a
//! timeout never fails a job by itself, and a confirmation report is
//! still re-checked before the job is allowed to complete.

use std::time::Duration;

use crate::ledger::{LedgerClient, LedgerError, SignatureStatus};

/// Authoritative outcome of a confirmation sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The ledger reports the signature at or beyond confirmed commitment
    Succeeded(SignatureStatus),
    /// The ledger has not yet surfaced the signature; worth retrying
    StillPending,
    /// Terminal on-chain error
    Errored(String),
}

/// Run the two-phase confirmation protocol for a submitted signature
///
/// Returns an error only when the authoritative status query itself fails;
/// the phase-one race swallows its own errors.
pub async fn confirm_signature(
    ledger: &dyn LedgerClient,
    signature: &str,
    timeout: Duration,
) -> Result<ConfirmOutcome, LedgerError> {
    let raced = tokio::time::timeout(timeout, ledger.await_confirmation(signature)).await;

    match raced {
        Ok(Ok(())) => {
            tracing::debug!(target: "walletq::jobs", signature = %signature, "confirmation wait returned");
        }
        Ok(Err(e)) => {
            tracing::debug!(
                target: "walletq::jobs",
                signature = %signature,
                error = %e,
                "confirmation wait errored, deferring to status query"
            );
        }
        Err(_) => {
            tracing::debug!(
                target: "walletq::jobs",
                signature = %signature,
                timeout_secs = timeout.as_secs(),
                "confirmation wait timed out, deferring to status query"
            );
        }
    }

    let status = ledger.signature_status(signature).await?;

    let outcome = match status {
        SignatureStatus::Confirmed | SignatureStatus::Finalized => ConfirmOutcome::Succeeded(status),
        SignatureStatus::Pending => ConfirmOutcome::StillPending,
        SignatureStatus::Errored(reason) => ConfirmOutcome::Errored(reason),
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Ledger stub whose confirmation wait hangs for a configurable time
    /// and whose status query returns a fixed answer.
    struct StubLedger {
        hang: Duration,
        status: SignatureStatus,
        status_calls: AtomicU32,
    }

    impl StubLedger {
        fn new(hang: Duration, status: SignatureStatus) -> Self {
            Self {
                hang,
                status,
                status_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LedgerClient for StubLedger {
        async fn request_credit(&self, _: &str, _: u64) -> Result<String, LedgerError> {
            Ok("sig".to_string())
        }

        async fn submit_transfer(&self, _: &str, _: &str, _: u64) -> Result<String, LedgerError> {
            Ok("sig".to_string())
        }

        async fn await_confirmation(&self, _: &str) -> Result<(), LedgerError> {
            tokio::time::sleep(self.hang).await;
            Ok(())
        }

        async fn signature_status(&self, _: &str) -> Result<SignatureStatus, LedgerError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.status.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_confirmation_still_checks_status() {
        let ledger = StubLedger::new(Duration::from_millis(100), SignatureStatus::Finalized);

        let outcome = confirm_signature(&ledger, "sig", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::Succeeded(SignatureStatus::Finalized));
        assert_eq!(ledger.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_finalized_status_succeeds() {
        // The wait hangs far past the deadline, but the ledger actually
        // landed the transaction: the timeout must not fail the job.
        let ledger = StubLedger::new(Duration::from_secs(600), SignatureStatus::Confirmed);

        let outcome = confirm_signature(&ledger, "sig", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::Succeeded(SignatureStatus::Confirmed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_pending_status_is_retryable() {
        let ledger = StubLedger::new(Duration::from_secs(600), SignatureStatus::Pending);

        let outcome = confirm_signature(&ledger, "sig", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::StillPending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_chain_error_is_terminal() {
        let ledger = StubLedger::new(
            Duration::from_millis(10),
            SignatureStatus::Errored("insufficient funds".to_string()),
        );

        let outcome = confirm_signature(&ledger, "sig", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ConfirmOutcome::Errored("insufficient funds".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_status_query() {
        let ledger = StubLedger::new(Duration::from_secs(600), SignatureStatus::Pending);

        confirm_signature(&ledger, "sig", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(ledger.status_calls.load(Ordering::SeqCst), 1);
    }
}
