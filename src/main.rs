//! walletq Backend - Money-Movement Services
//!
//! Long-running services:
//! 1. Worker Pools - Drain the credit and transfer job queues
//! 2. Notification Dispatcher - Delivers signed webhooks for tracked signatures
//! 3. Stats Reporter - Periodic per-queue count logging
//!
//! Run modes:
//!   cargo run                 - Show usage
//!   cargo run -- serve        - Start the full backend

use std::env;
use std::sync::Arc;

use walletq::jobs::{JobQueue, StatsReporter, WorkerPool};
use walletq::webhooks::{HttpSender, NotificationDispatcher, SubscriptionRegistry};
use walletq::{common, units, SolanaLedger, SqliteStore, WalletqConfig, WalletqError};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "serve" => {
            if let Err(e) = run_service(&args[2..]).await {
                eprintln!("Error [{}]: {}", e.error_code(), e);
                std::process::exit(1);
            }
        }
        "help" | "--help" | "-h" => print_usage(),
        _ => print_usage(),
    }
}

fn print_usage() {
    println!("walletq Backend - Money-Movement Services");
    println!();
    println!("Usage:");
    println!("  walletq serve [--db <path>]    Start workers, dispatcher and stats reporter");
    println!();
    println!("Environment Variables:");
    println!("  WALLETQ_NETWORK           mainnet, testnet or devnet (default: devnet)");
    println!("  WALLETQ_RPC_URL           Solana RPC endpoint");
    println!("  WALLETQ_DB_PATH           SQLite database file (default: data/walletq.db)");
    println!("  WALLETQ_CREDIT_WORKERS    Concurrent credit workers (default: 5)");
    println!("  WALLETQ_TRANSFER_WORKERS  Concurrent transfer workers (default: 3)");
    println!("  WALLETQ_LOG_LEVEL         debug, info, warn or error (default: info)");
    println!();
    println!("See the module documentation for the full variable list.");
}

async fn run_service(args: &[String]) -> Result<(), WalletqError> {
    dotenv::dotenv().ok();

    let mut config = WalletqConfig::from_env()?;

    // Parse arguments
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--db" if i + 1 < args.len() => {
                config.db_path = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }

    common::logging::init_from_config(&config)?;
    config.log_summary();
    tracing::info!(
        target: "walletq::system",
        nominal = %units::format_lamports(config.nominal_credit_lamports),
        fallback = %units::format_lamports(config.fallback_lamports),
        "credit fallback chain configured"
    );

    let config = Arc::new(config);

    let store = Arc::new(SqliteStore::new(&config.db_path)?);

    let ledger = Arc::new(SolanaLedger::new(config.rpc_url.clone()));
    if !ledger.healthy().await {
        tracing::warn!(
            target: "walletq::system",
            rpc_url = %config.rpc_url,
            "RPC endpoint unhealthy at startup, continuing anyway"
        );
    }

    // Jobs orphaned by a previous process go back to waiting before any
    // worker can claim
    let queue = JobQueue::new(store.clone(), config.clone());
    queue
        .recover_orphaned()
        .await
        .map_err(|e| WalletqError::service(format!("orphan recovery failed: {}", e)))?;

    let pool = Arc::new(WorkerPool::new(store.clone(), ledger.clone(), config.clone()));
    let worker_handles = pool.spawn().await;

    let registry = Arc::new(SubscriptionRegistry::new(store.clone()));
    let sender = Arc::new(
        HttpSender::new()
            .map_err(|e| WalletqError::service(format!("HTTP client setup failed: {}", e)))?,
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(
        registry,
        ledger.clone(),
        sender,
        config.clone(),
    ));
    let dispatcher_handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.run().await })
    };

    let stats = Arc::new(StatsReporter::new(store.clone(), config.clone()));
    let stats_handle = {
        let stats = stats.clone();
        tokio::spawn(async move { stats.run().await })
    };

    tracing::info!(target: "walletq::system", "walletq backend running, press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "walletq::system", error = %e, "signal handler failed");
    }

    tracing::info!(target: "walletq::system", "shutdown requested");
    pool.stop().await;
    dispatcher.stop().await;
    stats.stop().await;

    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = dispatcher_handle.await;
    // The stats loop may be mid-sleep on a long interval; don't wait it out
    stats_handle.abort();

    tracing::info!(target: "walletq::system", "walletq backend stopped");
    Ok(())
}
