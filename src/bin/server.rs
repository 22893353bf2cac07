//! memdb Server Binary
//!
//! Starts the UDP server for memdb.

use std::time::Duration;

use clap::Parser;
use memdb::config::LogSyncStrategy;
use memdb::network::Server;
use memdb::{Config, Engine, RecoveryMode};
use tracing_subscriber::{fmt, EnvFilter};

/// memdb Server
#[derive(Parser, Debug)]
#[command(name = "memdb-server")]
#[command(about = "Embedded hierarchical in-memory database")]
#[command(version)]
struct Args {
    /// Data directory (snapshots, logs, dumps)
    #[arg(short, long, default_value = "./memdb_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7777")]
    listen: String,

    /// Log records that trigger a snapshot
    #[arg(short, long, default_value = "1000")]
    snapshot_threshold: u64,

    /// fsync the log after this many records (0 = every record)
    #[arg(long, default_value = "16")]
    sync_every: usize,

    /// Replay policy: truncate, skip, retry or fatal
    #[arg(short, long, default_value = "truncate")]
    recovery_mode: RecoveryMode,

    /// Lock reservation ceiling in microseconds
    #[arg(long, default_value = "5000000")]
    max_lock_us: u64,

    /// Host subscribers listen on
    #[arg(long, default_value = "127.0.0.1")]
    notify_host: String,
}

fn main() {
    // Initialize tracing/logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,memdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("memdb Server v{}", memdb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = match args.sync_every {
        0 => LogSyncStrategy::EveryWrite,
        count => LogSyncStrategy::EveryNEntries { count },
    };

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .snapshot_threshold(args.snapshot_threshold)
        .log_sync_strategy(sync_strategy)
        .recovery_mode(args.recovery_mode)
        .max_lock_timeout(Duration::from_micros(args.max_lock_us))
        .notify_host(&args.notify_host)
        .build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    // Start server
    let mut server = match Server::bind(config, engine) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
