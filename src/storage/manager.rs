//! Persistence Manager
//!
//! Owns one database's snapshot file and operation log.
//!
//! ## Responsibilities
//! - Load the latest snapshot and replay the log on startup
//! - Append one record per must-persist mutation
//! - Take a snapshot and rotate the log once the threshold is crossed
//! - Track degraded durability when the log cannot be written

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, LogSyncStrategy, RecoveryMode};
use crate::error::{MemdbError, Result};
use crate::store::NodeTree;
use crate::wal::{LogOperation, LogRecovery, LogWriter, RecoveryResult};

use super::replay::{self, ReplayStats};
use super::snapshot::{self, Snapshot, SnapshotBuilder, SnapshotReader};

/// What startup recovery found for one database
#[derive(Debug, Default, Clone)]
pub struct RecoveryReport {
    /// A snapshot file existed but could not be read
    pub snapshot_discarded: bool,

    /// Snapshot replay counters
    pub snapshot: ReplayStats,

    /// Log scan result (torn tail handling)
    pub log: RecoveryResult,

    /// Log replay counters
    pub replay: ReplayStats,

    /// A fresh snapshot was taken after replay
    pub checkpointed: bool,
}

/// Persistence for one database instance
pub struct Persistence {
    /// Database name, used in file names and log fields
    name: String,
    snapshot_path: PathBuf,
    log_path: PathBuf,
    dump_path: PathBuf,

    /// `None` until `recover()` ran, or after the log could not be reopened
    writer: Option<LogWriter>,
    sync_strategy: LogSyncStrategy,

    /// Log length that triggers a snapshot
    snapshot_threshold: u64,

    /// Set once a log write failed; mutations since may not survive a crash
    degraded: bool,

    snapshots_taken: u64,
}

impl Persistence {
    /// Describe the files for database `name` under the configured directory
    ///
    /// Nothing is touched on disk until `recover()`.
    pub fn new(name: &str, config: &Config) -> Self {
        let dir = &config.data_dir;
        Self {
            name: name.to_string(),
            snapshot_path: dir.join(format!("{}.snap", name)),
            log_path: dir.join(format!("{}.log", name)),
            dump_path: dir.join(format!("{}.dump", name)),
            writer: None,
            sync_strategy: config.log_sync_strategy,
            snapshot_threshold: config.snapshot_threshold,
            degraded: false,
            snapshots_taken: 0,
        }
    }

    /// Rebuild `tree` from disk and open the log for appending
    ///
    /// On startup:
    /// 1. Load the snapshot (missing or malformed means start fresh)
    /// 2. Cut the log back to its well-formed prefix and replay it
    /// 3. Open the log writer
    /// 4. If anything was replayed, snapshot and rotate the log
    pub fn recover(&mut self, tree: &mut NodeTree, mode: RecoveryMode) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        if let Some(dir) = self.log_path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Step 1: Snapshot
        if self.snapshot_path.exists() {
            match SnapshotReader::open(&self.snapshot_path).and_then(SnapshotReader::read_all) {
                Ok(records) => {
                    report.snapshot = replay::load_snapshot(tree, records, mode)?;
                }
                Err(e) if mode == RecoveryMode::Fatal => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        db = %self.name,
                        error = %e,
                        "Discarding unreadable snapshot, starting fresh"
                    );
                    report.snapshot_discarded = true;
                }
            }
        }

        // Step 2: Log
        if self.log_path.exists() {
            let (records, scan) = LogRecovery::recover(&self.log_path)?;
            report.log = scan;
            report.replay = replay::replay_log(tree, records, mode)?;
        }

        // Step 3: Writer
        self.writer = Some(LogWriter::open(&self.log_path, self.sync_strategy)?);

        // Step 4: Fold the replayed log into a fresh snapshot
        if report.log.records_recovered > 0 {
            self.checkpoint(tree)?;
            report.checkpointed = true;
        }

        tracing::info!(
            db = %self.name,
            nodes = tree.len(),
            snapshot_nodes = report.snapshot.total_applied(),
            log_records = report.log.records_recovered,
            log_corrupted = report.log.records_corrupted,
            replayed = report.replay.total_applied(),
            "Recovered database"
        );

        Ok(report)
    }

    /// Append a must-persist mutation
    ///
    /// A write failure only marks durability as degraded; the caller's
    /// in-memory mutation stands either way. Crossing the threshold takes
    /// a snapshot of `tree`.
    pub fn record(&mut self, operation: LogOperation, tree: &NodeTree) {
        let Some(writer) = self.writer.as_mut() else {
            self.mark_degraded("operation log is not open");
            return;
        };

        if let Err(e) = writer.append(operation) {
            self.mark_degraded(&e.to_string());
            return;
        }

        if writer.record_count() >= self.snapshot_threshold.max(1) {
            if let Err(e) = self.checkpoint(tree) {
                self.mark_degraded(&e.to_string());
            }
        }
    }

    /// Write a snapshot of `tree`, then rotate the log
    pub fn checkpoint(&mut self, tree: &NodeTree) -> Result<Snapshot> {
        let mut builder = SnapshotBuilder::new(&self.snapshot_path)?;
        for record in snapshot::collect_records(tree) {
            builder.add(&record)?;
        }
        let snapshot = builder.finish()?;

        match self.writer.as_mut() {
            Some(writer) => writer.rotate()?,
            None => {
                return Err(MemdbError::Recovery(format!(
                    "operation log for '{}' is not open",
                    self.name
                )))
            }
        }

        self.snapshots_taken += 1;
        tracing::debug!(
            db = %self.name,
            records = snapshot.record_count,
            attrs = snapshot.attr_count,
            bytes = snapshot.file_size,
            "Snapshot written, log rotated"
        );

        Ok(snapshot)
    }

    /// Force the log to disk
    pub fn sync(&mut self) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.sync(),
            None => Ok(()),
        }
    }

    fn mark_degraded(&mut self, reason: &str) {
        if !self.degraded {
            tracing::warn!(db = %self.name, %reason, "Operation log write failed, durability degraded");
        }
        self.degraded = true;
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken
    }

    /// Records in the current log generation
    pub fn log_len(&self) -> u64 {
        self.writer.as_ref().map_or(0, LogWriter::record_count)
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }
}
