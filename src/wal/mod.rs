//! Operation Log Module
//!
//! Provides durability between snapshots through append-only logging.
//!
//! ## Responsibilities
//! - Append one record per must-persist mutation
//! - CRC32 checksums for corruption detection
//! - Sequence numbers for ordering
//! - Torn-tail detection and truncation on recovery
//! - Rotation into a previous generation after a snapshot
//!
//! ## File Format
//! One record per line, human-readable prefix first:
//! ```text
//! 2026-10-16T08:12:44.031Z 1 9f2c01aa 0100000000000000...
//! └─ timestamp (UTC) ─────┘ │ └─crc──┘ └─ hex(bincode(LogRecord)) ─┘
//!                           └ action: 1 create, 2 destroy, 3 set, 4 remove
//! ```

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{LogAction, LogOperation, LogRecord};
pub use reader::{LogIterator, LogReader};
pub use recovery::{LogRecovery, RecoveryResult};
pub use writer::LogWriter;
