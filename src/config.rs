//! Configuration for memdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a memdb engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── primary.snap     (snapshot)
    ///     ├── primary.log      (current operation log)
    ///     ├── primary.log.1    (previous log generation)
    ///     ├── primary.dump     (diagnostic dump)
    ///     └── pod.*            (same layout for the pod database)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Operation Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the operation log
    pub log_sync_strategy: LogSyncStrategy,

    /// Number of log records that triggers a snapshot + log rotation
    pub snapshot_threshold: u64,

    /// What to do with replay records whose parent cannot be resolved
    pub recovery_mode: RecoveryMode,

    // -------------------------------------------------------------------------
    // Lock Configuration
    // -------------------------------------------------------------------------
    /// Hard ceiling for a lock reservation
    pub max_lock_timeout: Duration,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// UDP listen address
    pub listen_addr: String,

    /// Largest accepted request datagram (bytes)
    pub max_request_len: usize,

    /// Cooperative timer granularity (milliseconds)
    pub tick_interval_ms: u64,

    /// Host that subscribers listen on for notifications
    pub notify_host: String,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Replay policy for records that reference a node that is not loaded yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Stop loading the affected file at the first unresolvable record
    #[default]
    Truncate,

    /// Drop the unresolvable record and keep going
    Skip,

    /// Set unresolvable records aside and retry them after the pass
    Retry,

    /// Fail engine start-up
    Fatal,
}

impl std::str::FromStr for RecoveryMode {
    type Err = crate::MemdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truncate" => Ok(RecoveryMode::Truncate),
            "skip" => Ok(RecoveryMode::Skip),
            "retry" => Ok(RecoveryMode::Retry),
            "fatal" => Ok(RecoveryMode::Fatal),
            other => Err(crate::MemdbError::Config(format!(
                "unknown recovery mode '{}'",
                other
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./memdb_data"),
            log_sync_strategy: LogSyncStrategy::EveryNEntries { count: 16 },
            snapshot_threshold: 1000,
            recovery_mode: RecoveryMode::Truncate,
            max_lock_timeout: Duration::from_secs(5),
            listen_addr: "127.0.0.1:7777".to_string(),
            max_request_len: 8192,
            tick_interval_ms: 50,
            notify_host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Cooperative timer granularity as a Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the log sync strategy
    pub fn log_sync_strategy(mut self, strategy: LogSyncStrategy) -> Self {
        self.config.log_sync_strategy = strategy;
        self
    }

    /// Set the log length (in records) that triggers a snapshot
    pub fn snapshot_threshold(mut self, records: u64) -> Self {
        self.config.snapshot_threshold = records;
        self
    }

    /// Set the replay policy for unresolvable records
    pub fn recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.config.recovery_mode = mode;
        self
    }

    /// Set the lock reservation ceiling
    pub fn max_lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.max_lock_timeout = timeout;
        self
    }

    /// Set the UDP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the largest accepted request datagram (in bytes)
    pub fn max_request_len(mut self, len: usize) -> Self {
        self.config.max_request_len = len;
        self
    }

    /// Set the cooperative timer granularity (in milliseconds)
    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    /// Set the host subscribers listen on
    pub fn notify_host(mut self, host: impl Into<String>) -> Self {
        self.config.notify_host = host.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
