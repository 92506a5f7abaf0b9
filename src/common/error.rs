//! Common Error Types for the walletq Backend
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

/// Root error type for the walletq backend
#[derive(Debug, Error)]
pub enum WalletqError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Ledger-side errors
    #[error("ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    /// Validation errors (rejected before enqueue)
    #[error("validation error: {0}")]
    Validation(String),

    /// Service errors
    #[error("service error: {0}")]
    Service(String),

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalletqError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            WalletqError::Ledger(e) => e.is_transient(),
            WalletqError::Storage(_) | WalletqError::Io(_) => true,
            _ => false,
        }
    }

    /// Get error code for boundary responses
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletqError::Config(_) => "CONFIG_ERROR",
            WalletqError::Logging(_) => "LOGGING_ERROR",
            WalletqError::Storage(_) => "STORAGE_ERROR",
            WalletqError::Ledger(_) => "LEDGER_ERROR",
            WalletqError::Validation(_) => "VALIDATION_ERROR",
            WalletqError::Service(_) => "SERVICE_ERROR",
            WalletqError::Internal(_) => "INTERNAL_ERROR",
            WalletqError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using WalletqError
pub type Result<T> = std::result::Result<T, WalletqError>;
