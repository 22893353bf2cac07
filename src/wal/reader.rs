//! Log Reader
//!
//! Handles reading records from an operation-log file, one line at a time.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{MemdbError, Result};

use super::LogRecord;

/// Reads records from a log file
pub struct LogReader {
    reader: BufReader<File>,

    /// Byte offset just past the last well-formed line
    valid_len: u64,

    line_buf: String,
}

impl LogReader {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            valid_len: 0,
            line_buf: String::new(),
        })
    }

    /// Read the next record
    ///
    /// Returns `Ok(None)` at end of file and `Err(LogCorruption)` for a line
    /// that is torn (no trailing newline) or fails to decode.
    pub fn next_record(&mut self) -> Result<Option<LogRecord>> {
        self.line_buf.clear();
        let read = match self.reader.read_line(&mut self.line_buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(MemdbError::LogCorruption(
                    "log line is not valid UTF-8".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        if read == 0 {
            return Ok(None);
        }

        if !self.line_buf.ends_with('\n') {
            return Err(MemdbError::LogCorruption(format!(
                "torn record at offset {}",
                self.valid_len
            )));
        }

        let record = LogRecord::decode_line(self.line_buf.trim_end_matches('\n'))?;
        self.valid_len += read as u64;

        Ok(Some(record))
    }

    /// Byte length of the well-formed prefix read so far
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Iterate over records, stopping after the first error
    pub fn records(self) -> LogIterator {
        LogIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over log records
pub struct LogIterator {
    reader: LogReader,
    done: bool,
}

impl Iterator for LogIterator {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
