//! Log Writer
//!
//! Handles appending records to the current log file and rotating it into
//! the previous generation once a snapshot has been taken.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::LogSyncStrategy;
use crate::error::Result;

use super::{LogOperation, LogRecord, LogRecovery};

/// Writes records to the current log file
pub struct LogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_strategy: LogSyncStrategy,

    /// Records in the current file
    record_count: u64,

    /// Records written since the last fsync
    unsynced: usize,

    /// Sequence number of the last appended record
    last_seq: u64,
}

impl LogWriter {
    /// Open or create a log file
    ///
    /// An existing file is scanned so record counting and sequence numbers
    /// continue where it left off.
    pub fn open(path: &Path, sync_strategy: LogSyncStrategy) -> Result<Self> {
        let (record_count, last_seq) = if path.exists() {
            let stats = LogRecovery::verify(path)?;
            (stats.records_recovered, stats.last_seq)
        } else {
            (0, 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync_strategy,
            record_count,
            unsynced: 0,
            last_seq,
        })
    }

    /// Append a record, returning its sequence number
    pub fn append(&mut self, operation: LogOperation) -> Result<u64> {
        let seq = self.last_seq + 1;
        let line = LogRecord::new(seq, operation).encode_line(Utc::now())?;

        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        self.last_seq = seq;
        self.record_count += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            LogSyncStrategy::EveryWrite => true,
            LogSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }

        Ok(seq)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Move the current file to the previous generation and start empty
    ///
    /// Any older previous generation is replaced.
    pub fn rotate(&mut self) -> Result<()> {
        self.sync()?;

        let previous = Self::previous_path(&self.path);
        fs::rename(&self.path, &previous)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.record_count = 0;
        self.last_seq = 0;

        Ok(())
    }

    /// Path of the previous generation for a log file
    pub fn previous_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".1");
        PathBuf::from(name)
    }

    /// Records in the current file
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Sequence number of the last appended record
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
