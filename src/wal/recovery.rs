//! Log Recovery
//!
//! Reads back a log file after a restart and cuts off a torn tail.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{MemdbError, Result};

use super::{LogReader, LogRecord};

/// Handles log recovery after a crash
pub struct LogRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully read
    pub records_recovered: u64,

    /// Number of unreadable lines from the first bad one to end of file
    pub records_corrupted: u64,

    /// Sequence number of the last good record (0 when none)
    pub last_seq: u64,

    /// Whether the file was cut back to its well-formed prefix
    pub was_truncated: bool,
}

impl LogRecovery {
    /// Recover records from a log file
    ///
    /// This will:
    /// 1. Read records until end of file or the first bad line
    /// 2. Count the lines that could not be read
    /// 3. Truncate the file to its well-formed prefix
    /// 4. Return all good records in file order
    pub fn recover(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        let (records, result, valid_len) = Self::scan(path)?;

        if result.records_corrupted > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;

            tracing::warn!(
                path = %path.display(),
                kept = result.records_recovered,
                dropped = result.records_corrupted,
                "Truncated torn operation log tail"
            );

            return Ok((
                records,
                RecoveryResult {
                    was_truncated: true,
                    ..result
                },
            ));
        }

        Ok((records, result))
    }

    /// Verify integrity of a log file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult, u64)> {
        let mut reader = LogReader::open(path)?;
        let mut records = Vec::new();
        let mut result = RecoveryResult::default();

        let valid_len = loop {
            match reader.next_record() {
                Ok(Some(record)) => {
                    result.records_recovered += 1;
                    result.last_seq = record.seq;
                    records.push(record);
                }
                Ok(None) => break reader.valid_len(),
                Err(MemdbError::LogCorruption(reason)) => {
                    tracing::debug!(path = %path.display(), %reason, "Corrupt log line");
                    let valid_len = reader.valid_len();
                    result.records_corrupted = 1 + Self::count_remaining_lines(&mut reader);
                    break valid_len;
                }
                Err(e) => return Err(e),
            }
        };

        Ok((records, result, valid_len))
    }

    fn count_remaining_lines(reader: &mut LogReader) -> u64 {
        let mut count = 0;
        loop {
            match reader.next_record() {
                Ok(None) => return count,
                Ok(Some(_)) | Err(MemdbError::LogCorruption(_)) => count += 1,
                Err(_) => return count,
            }
        }
    }
}
