//! Common Infrastructure Module
//!
//! Shared utilities and configuration for the walletq backend.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, Network, WalletqConfig};
pub use error::{Result, WalletqError};
pub use logging::{init_from_config, init_logging, LogLevel, LoggingError};
