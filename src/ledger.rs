//! Ledger Client
//!
//! Thin client for the external Solana ledger. The rest of the system only
//! sees the `LedgerClient` trait: submit an operation, get a signature
//! back, and query that signature until the ledger reports a terminal
//! state. Transaction encoding stays inside this module.
//!
//! Errors are split into transient (network, timeout, rate limit - worth
//! retrying) and definitive (the ledger rejected the operation, or the
//! inputs can never work - retrying cannot help).

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_instruction,
    transaction::Transaction,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Network/RPC failure; the operation may succeed on retry
    #[error("transient ledger error: {0}")]
    Transient(String),

    /// The ledger definitively rejected the operation; never retried
    #[error("ledger rejected operation: {0}")]
    Definitive(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Status of a submitted signature as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Not yet visible at any trusted commitment level
    Pending,
    /// Reached the confirmed commitment level
    Confirmed,
    /// Reached finality; the ledger guarantees no further change
    Finalized,
    /// Terminal on-chain error
    Errored(String),
}

impl SignatureStatus {
    /// Finalized and errored are terminal ledger states
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Errored(_))
    }
}

/// Opaque interface to the external ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Request a faucet credit; returns the transaction signature
    async fn request_credit(&self, recipient: &str, lamports: u64) -> Result<String, LedgerError>;

    /// Build, sign and submit a transfer; returns the transaction signature
    async fn submit_transfer(
        &self,
        from_secret_b64: &str,
        recipient: &str,
        lamports: u64,
    ) -> Result<String, LedgerError>;

    /// Wait until the signature reaches the confirmed commitment
    ///
    /// May hang past practical limits; callers race it against their own
    /// deadline and never trust it as ground truth.
    async fn await_confirmation(&self, signature: &str) -> Result<(), LedgerError>;

    /// One authoritative status query for a signature
    async fn signature_status(&self, signature: &str) -> Result<SignatureStatus, LedgerError>;
}

/// Production ledger client backed by a Solana RPC endpoint
pub struct SolanaLedger {
    rpc: RpcClient,
}

impl SolanaLedger {
    /// Create a new client for the given RPC endpoint
    pub fn new(rpc_url: impl Into<String>) -> Self {
        let rpc = RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed());
        Self { rpc }
    }

    /// Check RPC connectivity
    pub async fn healthy(&self) -> bool {
        self.rpc.get_health().await.is_ok()
    }

    fn parse_pubkey(s: &str) -> Result<Pubkey, LedgerError> {
        Pubkey::from_str(s).map_err(|e| LedgerError::Definitive(format!("invalid pubkey: {}", e)))
    }

    fn parse_signature(s: &str) -> Result<Signature, LedgerError> {
        Signature::from_str(s)
            .map_err(|e| LedgerError::Definitive(format!("invalid signature: {}", e)))
    }

    fn parse_keypair(secret_b64: &str) -> Result<Keypair, LedgerError> {
        let bytes = BASE64
            .decode(secret_b64)
            .map_err(|e| LedgerError::Definitive(format!("invalid key material: {}", e)))?;
        Keypair::try_from(&bytes[..])
            .map_err(|e| LedgerError::Definitive(format!("invalid keypair bytes: {}", e)))
    }
}

#[async_trait]
impl LedgerClient for SolanaLedger {
    async fn request_credit(&self, recipient: &str, lamports: u64) -> Result<String, LedgerError> {
        let pubkey = Self::parse_pubkey(recipient)?;

        let signature = self
            .rpc
            .request_airdrop(&pubkey, lamports)
            .await
            .map_err(|e| LedgerError::Transient(format!("airdrop request failed: {}", e)))?;

        Ok(signature.to_string())
    }

    async fn submit_transfer(
        &self,
        from_secret_b64: &str,
        recipient: &str,
        lamports: u64,
    ) -> Result<String, LedgerError> {
        let from = Self::parse_keypair(from_secret_b64)?;
        let to = Self::parse_pubkey(recipient)?;

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::Transient(format!("blockhash fetch failed: {}", e)))?;

        let instruction = system_instruction::transfer(&from.pubkey(), &to, lamports);
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&from.pubkey()),
            &[&from],
            blockhash,
        );

        let signature = self
            .rpc
            .send_transaction(&transaction)
            .await
            .map_err(|e| LedgerError::Transient(format!("transfer submission failed: {}", e)))?;

        Ok(signature.to_string())
    }

    async fn await_confirmation(&self, signature: &str) -> Result<(), LedgerError> {
        let signature = Self::parse_signature(signature)?;

        loop {
            let confirmed = self
                .rpc
                .confirm_transaction(&signature)
                .await
                .map_err(|e| LedgerError::Transient(format!("confirmation poll failed: {}", e)))?;

            if confirmed {
                return Ok(());
            }

            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn signature_status(&self, signature: &str) -> Result<SignatureStatus, LedgerError> {
        let signature = Self::parse_signature(signature)?;

        let finalized = self
            .rpc
            .get_signature_status_with_commitment(&signature, CommitmentConfig::finalized())
            .await
            .map_err(|e| LedgerError::Transient(format!("status query failed: {}", e)))?;

        match finalized {
            Some(Err(e)) => return Ok(SignatureStatus::Errored(e.to_string())),
            Some(Ok(())) => return Ok(SignatureStatus::Finalized),
            None => {}
        }

        let confirmed = self
            .rpc
            .get_signature_status_with_commitment(&signature, CommitmentConfig::confirmed())
            .await
            .map_err(|e| LedgerError::Transient(format!("status query failed: {}", e)))?;

        match confirmed {
            Some(Err(e)) => Ok(SignatureStatus::Errored(e.to_string())),
            Some(Ok(())) => Ok(SignatureStatus::Confirmed),
            None => Ok(SignatureStatus::Pending),
        }
    }
}
