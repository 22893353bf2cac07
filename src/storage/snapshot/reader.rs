//! Snapshot Reader
//!
//! Validates a snapshot file and decodes its records in file order.

use std::fs;
use std::path::Path;

use bytes::{Buf, Bytes};

use crate::error::{MemdbError, Result};
use crate::store::{AttrType, NodeType, SnapshotFlag};

use super::{
    SnapshotAttr, SnapshotRecord, FOOTER_SIZE, HEADER_SIZE, MAGIC, MIN_RECORD_SIZE, VERSION,
};

/// Reader over a validated snapshot file
pub struct SnapshotReader {
    /// Record block (header and footer stripped)
    body: Bytes,
    record_count: u64,
}

impl SnapshotReader {
    /// Open a snapshot and validate header and checksum
    pub fn open(path: &Path) -> Result<Self> {
        let raw = Bytes::from(fs::read(path)?);
        Self::from_bytes(raw)
    }

    /// Validate an in-memory snapshot image
    pub fn from_bytes(mut raw: Bytes) -> Result<Self> {
        if (raw.len() as u64) < HEADER_SIZE + FOOTER_SIZE {
            return Err(MemdbError::SnapshotCorruption(format!(
                "file too short: {} bytes",
                raw.len()
            )));
        }

        if &raw[0..4] != MAGIC {
            return Err(MemdbError::SnapshotCorruption(format!(
                "invalid magic: expected MDBS, got {:?}",
                &raw[0..4]
            )));
        }

        // Footer covers the header too, so a damaged count is caught here
        let covered_len = raw.len() - FOOTER_SIZE as usize;
        let actual_crc = crc32fast::hash(&raw[..covered_len]);
        let expected_crc = (&raw[covered_len..]).get_u32_le();
        if expected_crc != actual_crc {
            return Err(MemdbError::SnapshotCorruption(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual_crc
            )));
        }
        raw.advance(4);

        let version = raw.get_u16_le();
        if version != VERSION {
            return Err(MemdbError::SnapshotCorruption(format!(
                "unsupported snapshot version: {}",
                version
            )));
        }

        let record_count = raw.get_u64_le();
        let body = raw.split_to(raw.len() - FOOTER_SIZE as usize);

        if record_count > body.len() as u64 / MIN_RECORD_SIZE {
            return Err(MemdbError::SnapshotCorruption(format!(
                "header announces {} records but the block holds {} bytes",
                record_count,
                body.len()
            )));
        }

        Ok(Self { body, record_count })
    }

    /// Number of records announced by the header
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Decode every record
    pub fn read_all(mut self) -> Result<Vec<SnapshotRecord>> {
        let capacity = self.record_count.min(self.body.len() as u64 / MIN_RECORD_SIZE);
        let mut records = Vec::with_capacity(capacity as usize);
        for _ in 0..self.record_count {
            records.push(self.next_record()?);
        }

        if self.body.has_remaining() {
            return Err(MemdbError::SnapshotCorruption(format!(
                "{} trailing bytes after last record",
                self.body.remaining()
            )));
        }

        Ok(records)
    }

    fn next_record(&mut self) -> Result<SnapshotRecord> {
        let body = &mut self.body;

        need(body, MIN_RECORD_SIZE as usize, "node record")?;
        let parent_id = body.get_u64_le();
        let node_id = body.get_u64_le();
        let node_type = NodeType::from_u32(body.get_u32_le()).map_err(corrupt)?;
        let snapshot_flag = SnapshotFlag::from_u8(body.get_u8()).map_err(corrupt)?;
        let attr_count = body.get_u32_le();

        let mut attrs = Vec::with_capacity(attr_count.min(1024) as usize);
        for _ in 0..attr_count {
            need(body, 8 + 1 + 2 + 4 + 1, "attribute header")?;
            let cookie = body.get_u64_le();
            let attr_flag = SnapshotFlag::from_u8(body.get_u8()).map_err(corrupt)?;
            let name_len = body.get_u16_le() as usize;
            let data_len = body.get_u32_le() as usize;
            let attr_type = AttrType::from_u8(body.get_u8()).map_err(corrupt)?;

            need(body, name_len + data_len, "attribute payload")?;
            let name = String::from_utf8(body.split_to(name_len).to_vec()).map_err(|_| {
                MemdbError::SnapshotCorruption("attribute name is not UTF-8".to_string())
            })?;
            let data = body.split_to(data_len).to_vec();

            attrs.push(SnapshotAttr {
                cookie,
                snapshot_flag: attr_flag,
                attr_type,
                name,
                data,
            });
        }

        Ok(SnapshotRecord {
            parent_id,
            node_id,
            node_type,
            snapshot_flag,
            attrs,
        })
    }
}

fn need(buf: &Bytes, len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return Err(MemdbError::SnapshotCorruption(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(())
}

fn corrupt(e: MemdbError) -> MemdbError {
    MemdbError::SnapshotCorruption(e.to_string())
}
