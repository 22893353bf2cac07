//! Snapshot Builder
//!
//! Writes snapshot records to a temporary file and renames it into place.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{MemdbError, Result};

use super::{Snapshot, SnapshotRecord, MAGIC, VERSION};

/// Builder for a new snapshot file
pub struct SnapshotBuilder {
    /// Final file path
    path: PathBuf,
    /// Where records are written until `finish()`
    tmp_path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    record_count: u64,
    attr_count: u64,
    /// Running CRC hasher for the record block
    hasher: crc32fast::Hasher,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder
    ///
    /// Writes the header immediately; call `add()` with parents before
    /// children, then `finish()` to write the footer and publish the file.
    pub fn new(path: &Path) -> Result<Self> {
        let tmp_path = path.with_extension("snap.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);

        // Record count placeholder, patched in finish
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            record_count: 0,
            attr_count: 0,
            hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append one node record
    pub fn add(&mut self, record: &SnapshotRecord) -> Result<()> {
        let mut buf = Vec::with_capacity(25 + record.attrs.len() * 32);
        buf.extend_from_slice(&record.parent_id.to_le_bytes());
        buf.extend_from_slice(&record.node_id.to_le_bytes());
        buf.extend_from_slice(&(record.node_type as u32).to_le_bytes());
        buf.push(record.snapshot_flag as u8);
        buf.extend_from_slice(&(record.attrs.len() as u32).to_le_bytes());

        for attr in &record.attrs {
            let name_len = u16::try_from(attr.name.len()).map_err(|_| {
                MemdbError::Serialization(format!("attribute name too long: {}", attr.name))
            })?;
            let data_len = u32::try_from(attr.data.len()).map_err(|_| {
                MemdbError::Serialization(format!("attribute data too long: {}", attr.name))
            })?;

            buf.extend_from_slice(&attr.cookie.to_le_bytes());
            buf.push(attr.snapshot_flag as u8);
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(&data_len.to_le_bytes());
            buf.push(attr.attr_type as u8);
            buf.extend_from_slice(attr.name.as_bytes());
            buf.extend_from_slice(&attr.data);
        }

        self.writer.write_all(&buf)?;
        self.hasher.update(&buf);
        self.record_count += 1;
        self.attr_count += record.attrs.len() as u64;

        Ok(())
    }

    /// Finish: write footer, fsync, patch the count and rename into place
    ///
    /// The footer CRC covers the final header followed by the record block.
    pub fn finish(mut self) -> Result<Snapshot> {
        let mut header = crc32fast::Hasher::new();
        header.update(MAGIC);
        header.update(&VERSION.to_le_bytes());
        header.update(&self.record_count.to_le_bytes());
        header.combine(&self.hasher);
        let crc = header.finalize();
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| MemdbError::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.record_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;

        Ok(Snapshot {
            path: self.path,
            record_count: self.record_count,
            attr_count: self.attr_count,
            file_size,
        })
    }
}
