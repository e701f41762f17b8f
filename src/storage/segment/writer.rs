//! Segment Writer
//!
//! Persists a frozen memtable snapshot as a segment body plus index.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};

use bytes::BytesMut;

use crate::error::{EmberError, Result};
use crate::storage::StoragePaths;

use super::{
    encode_entry, IndexEntry, Segment, SegmentIndex, SEGMENT_HEADER_SIZE, SEGMENT_MAGIC, VERSION,
};

/// Writes one segment with a fixed id
pub struct SegmentWriter<'a> {
    paths: &'a StoragePaths,
    id: u64,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(paths: &'a StoragePaths, id: u64) -> Self {
        Self { paths, id }
    }

    /// Write `entries` as a new segment and return its handle.
    ///
    /// Steps:
    /// 1. Sort by key and reject duplicates
    /// 2. Write the body, recording each record's offset, then fsync
    /// 3. Write the index to `*.index.tmp`, fsync, rename to `*.index`
    /// 4. Fsync the directory so the rename survives a crash
    ///
    /// Existing files for this id (from a failed earlier attempt) are replaced.
    pub fn write(&self, mut entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Segment> {
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(EmberError::InvalidArgument(format!(
                "duplicate key {:?} in segment snapshot",
                String::from_utf8_lossy(&pair[0].0)
            )));
        }

        let segment_path = self.paths.segment_path(self.id);
        let index_path = self.paths.index_path(self.id);
        let index_tmp_path = self.paths.index_tmp_path(self.id);

        // Step 2: body
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&segment_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(SEGMENT_MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;

        let mut offset = SEGMENT_HEADER_SIZE;
        let mut index_entries = Vec::with_capacity(entries.len());
        let mut record = BytesMut::new();

        for (key, value) in entries {
            record.clear();
            encode_entry(&mut record, &key, &value);
            writer.write_all(&record)?;

            index_entries.push(IndexEntry { key, offset });
            offset += record.len() as u64;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| EmberError::Storage(format!("Failed to flush segment: {}", e)))?;
        file.sync_all()?;
        let segment_len = offset;

        // Step 3: index
        let index = SegmentIndex::new(index_entries, segment_len);
        {
            let mut index_file = File::create(&index_tmp_path)?;
            index_file.write_all(&index.encode())?;
            index_file.sync_all()?;
        }
        fs::rename(&index_tmp_path, &index_path)?;

        // Step 4: directory entry
        sync_dir(self.paths.dir())?;

        tracing::debug!(
            segment_id = self.id,
            entries = index.len(),
            bytes = segment_len,
            "segment written"
        );

        Ok(Segment::from_parts(self.id, segment_path, index_path, index))
    }
}

#[cfg(unix)]
fn sync_dir(dir: &std::path::Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &std::path::Path) -> Result<()> {
    Ok(())
}
