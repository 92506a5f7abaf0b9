//! Environment-based Configuration for the walletq Backend
//!
//! All settings load from environment variables with per-network defaults.
//!
//! # Environment Variables
//!
//! ## Network
//! - `WALLETQ_NETWORK` - "mainnet", "testnet", or "devnet" (default: "devnet")
//! - `WALLETQ_RPC_URL` - Solana RPC endpoint URL
//!
//! ## Storage
//! - `WALLETQ_DB_PATH` - SQLite database file (default: "data/walletq.db")
//!
//! ## Queue & Workers
//! - `WALLETQ_CREDIT_WORKERS` - concurrent credit workers (default: 5)
//! - `WALLETQ_TRANSFER_WORKERS` - concurrent transfer workers (default: 3)
//! - `WALLETQ_MAX_ATTEMPTS` - default attempt budget per job (default: 3)
//! - `WALLETQ_BACKOFF_BASE_MS` - exponential backoff base (default: 2000)
//! - `WALLETQ_CREDIT_CONFIRM_TIMEOUT_SECS` - confirmation race timeout (default: 30)
//! - `WALLETQ_TRANSFER_CONFIRM_TIMEOUT_SECS` - confirmation race timeout (default: 60)
//!
//! ## Credit Fallback
//! - `WALLETQ_FALLBACK_LAMPORTS` - reduced fallback amount (default: 0.25 SOL)
//! - `WALLETQ_FALLBACK_DELAY_MS` - mandatory delay before the fallback runs (default: 5000)
//!
//! ## Webhooks
//! - `WALLETQ_DISPATCH_INTERVAL_SECS` - dispatcher tick interval (default: 10)
//! - `WALLETQ_WEBHOOK_MAX_ATTEMPTS` - delivery attempts per notification (default: 3)
//!
//! ## Misc
//! - `WALLETQ_STATS_INTERVAL_SECS` - queue stats log interval (default: 120)
//! - `WALLETQ_LOG_LEVEL` - logging level (debug, info, warn, error)

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "mainnet-beta" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            _ => Err(ConfigError::InvalidValue(
                "WALLETQ_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Default Solana RPC for this network
    pub fn default_rpc(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
        }
    }

    /// Explorer cluster query parameter, if any
    pub fn explorer_cluster(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Testnet => Some("testnet"),
            Network::Devnet => Some("devnet"),
        }
    }

    /// Explorer-style reference URL for a transaction signature
    pub fn explorer_tx_url(&self, signature: &str) -> String {
        match self.explorer_cluster() {
            Some(cluster) => format!(
                "https://explorer.solana.com/tx/{}?cluster={}",
                signature, cluster
            ),
            None => format!("https://explorer.solana.com/tx/{}", signature),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct WalletqConfig {
    /// Network environment
    pub network: Network,
    /// Solana RPC endpoint
    pub rpc_url: String,
    /// SQLite database path
    pub db_path: String,

    /// Concurrent credit workers
    pub credit_workers: usize,
    /// Concurrent transfer workers
    pub transfer_workers: usize,
    /// Default attempt budget for enqueued jobs
    pub default_max_attempts: u32,
    /// Exponential backoff base in milliseconds
    pub backoff_base_ms: u64,
    /// Worker idle poll interval in milliseconds
    pub worker_poll_ms: u64,
    /// Confirmation race timeout for credit jobs, seconds
    pub credit_confirm_timeout_secs: u64,
    /// Confirmation race timeout for transfer jobs, seconds
    pub transfer_confirm_timeout_secs: u64,

    /// Nominal credit amount that qualifies for the fallback chain
    pub nominal_credit_lamports: u64,
    /// Reduced amount for the fallback child
    pub fallback_lamports: u64,
    /// Mandatory delay before the fallback child may run, milliseconds
    pub fallback_delay_ms: u64,
    /// Attempt budget for the fallback child
    pub fallback_max_attempts: u32,
    /// Backoff base for the fallback child, milliseconds
    pub fallback_backoff_base_ms: u64,

    /// Notification dispatcher tick interval, seconds
    pub dispatch_interval_secs: u64,
    /// Delivery attempts per notification
    pub webhook_max_attempts: u32,

    /// Queue statistics log interval, seconds
    pub stats_interval_secs: u64,
    /// Log level
    pub log_level: String,
}

impl WalletqConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let network: Network = env::var("WALLETQ_NETWORK")
            .unwrap_or_else(|_| "devnet".to_string())
            .parse()?;

        let rpc_url =
            env::var("WALLETQ_RPC_URL").unwrap_or_else(|_| network.default_rpc().to_string());

        let db_path =
            env::var("WALLETQ_DB_PATH").unwrap_or_else(|_| "data/walletq.db".to_string());

        let config = Self {
            network,
            rpc_url,
            db_path,
            credit_workers: env_or("WALLETQ_CREDIT_WORKERS", 5)?,
            transfer_workers: env_or("WALLETQ_TRANSFER_WORKERS", 3)?,
            default_max_attempts: env_or("WALLETQ_MAX_ATTEMPTS", 3)?,
            backoff_base_ms: env_or("WALLETQ_BACKOFF_BASE_MS", 2000)?,
            worker_poll_ms: env_or("WALLETQ_WORKER_POLL_MS", 500)?,
            credit_confirm_timeout_secs: env_or("WALLETQ_CREDIT_CONFIRM_TIMEOUT_SECS", 30)?,
            transfer_confirm_timeout_secs: env_or("WALLETQ_TRANSFER_CONFIRM_TIMEOUT_SECS", 60)?,
            nominal_credit_lamports: env_or("WALLETQ_NOMINAL_CREDIT_LAMPORTS", LAMPORTS_PER_SOL)?,
            fallback_lamports: env_or("WALLETQ_FALLBACK_LAMPORTS", LAMPORTS_PER_SOL / 4)?,
            fallback_delay_ms: env_or("WALLETQ_FALLBACK_DELAY_MS", 5000)?,
            fallback_max_attempts: env_or("WALLETQ_FALLBACK_MAX_ATTEMPTS", 2)?,
            fallback_backoff_base_ms: env_or("WALLETQ_FALLBACK_BACKOFF_BASE_MS", 3000)?,
            dispatch_interval_secs: env_or("WALLETQ_DISPATCH_INTERVAL_SECS", 10)?,
            webhook_max_attempts: env_or("WALLETQ_WEBHOOK_MAX_ATTEMPTS", 3)?,
            stats_interval_secs: env_or("WALLETQ_STATS_INTERVAL_SECS", 120)?,
            log_level: env::var("WALLETQ_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.credit_workers == 0 || self.transfer_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "WALLETQ_*_WORKERS".to_string(),
                "worker counts must be at least 1".to_string(),
            ));
        }
        if self.default_max_attempts == 0 || self.fallback_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "WALLETQ_MAX_ATTEMPTS".to_string(),
                "attempt budgets must be at least 1".to_string(),
            ));
        }
        if self.fallback_lamports >= self.nominal_credit_lamports {
            return Err(ConfigError::InvalidValue(
                "WALLETQ_FALLBACK_LAMPORTS".to_string(),
                "fallback amount must be below the nominal credit amount".to_string(),
            ));
        }
        Ok(())
    }

    /// Log a configuration summary (no secrets are held here)
    pub fn log_summary(&self) {
        tracing::info!(
            target: "walletq::system",
            network = ?self.network,
            rpc_url = %self.rpc_url,
            db_path = %self.db_path,
            credit_workers = self.credit_workers,
            transfer_workers = self.transfer_workers,
            max_attempts = self.default_max_attempts,
            dispatch_interval_secs = self.dispatch_interval_secs,
            "configuration loaded"
        );
    }
}

/// Parse an env var, falling back to a default when unset
fn env_or<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var_name.to_string(), value)),
        Err(_) => Ok(default),
    }
}
