//! Segment Reader
//!
//! Opens segment files and provides O(log n) key lookups via the index.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{EmberError, Result};
use crate::storage::StoragePaths;

use super::iterator::SegmentIterator;
use super::{
    entry_crc, EntryHeader, SegmentIndex, ENTRY_HEADER_SIZE, SEGMENT_HEADER_SIZE, SEGMENT_MAGIC,
    VERSION,
};

/// Handle to a published, immutable segment.
///
/// Only the index is held in memory. Each lookup opens its own read handle,
/// so a `Segment` can be shared across threads without locking.
#[derive(Debug)]
pub struct Segment {
    id: u64,
    segment_path: PathBuf,
    index_path: PathBuf,
    index: SegmentIndex,
}

impl Segment {
    pub(crate) fn from_parts(id: u64, segment_path: PathBuf, index_path: PathBuf, index: SegmentIndex) -> Self {
        Self {
            id,
            segment_path,
            index_path,
            index,
        }
    }

    /// Open a published segment for reading
    ///
    /// Loads the index into memory and checks the body header and length
    /// against it.
    pub fn open(paths: &StoragePaths, id: u64) -> Result<Self> {
        let segment_path = paths.segment_path(id);
        let index_path = paths.index_path(id);
        let index = SegmentIndex::load(&index_path)?;

        let mut file = File::open(&segment_path)?;
        let actual_len = file.metadata()?.len();
        if actual_len != index.segment_len() {
            return Err(EmberError::corrupt(
                &segment_path,
                actual_len.min(index.segment_len()),
                format!(
                    "segment is {} bytes, index expects {}",
                    actual_len,
                    index.segment_len()
                ),
            ));
        }

        let mut header = [0u8; SEGMENT_HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != SEGMENT_MAGIC {
            return Err(EmberError::corrupt(&segment_path, 0, "invalid segment magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(EmberError::corrupt(
                &segment_path,
                4,
                format!("unsupported segment version {}", version),
            ));
        }

        Ok(Self::from_parts(id, segment_path, index_path, index))
    }

    /// Get a value by key: O(log n) index search, then one record read
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found
    /// - `Ok(None)`: key not in this segment
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if !self.might_contain(key) {
            return Ok(None);
        }
        let offset = match self.index.find(key) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let mut file = File::open(&self.segment_path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; ENTRY_HEADER_SIZE];
        file.read_exact(&mut header)?;
        let header = EntryHeader::parse(&header);

        if offset + header.record_len() > self.index.segment_len() {
            return Err(EmberError::corrupt(&self.segment_path, offset, "record runs past segment end"));
        }

        let mut stored_key = vec![0u8; header.key_len];
        file.read_exact(&mut stored_key)?;
        if stored_key != key {
            return Err(EmberError::corrupt(&self.segment_path, offset, "index points at a different key"));
        }

        let mut value = vec![0u8; header.value_len];
        file.read_exact(&mut value)?;
        if entry_crc(&stored_key, &value) != header.crc {
            return Err(EmberError::corrupt(&self.segment_path, offset, "checksum mismatch"));
        }

        Ok(Some(value))
    }

    /// Segment id; larger ids are newer
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// Size of the segment body in bytes
    pub fn len(&self) -> u64 {
        self.index.segment_len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.min_key()
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.max_key()
    }

    /// Quick check if a key might be in this segment (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    pub fn segment_path(&self) -> &Path {
        &self.segment_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Iterate over all records in key order
    pub fn iter(&self) -> Result<SegmentIterator> {
        let file = File::open(&self.segment_path)?;
        SegmentIterator::new(
            self.segment_path.clone(),
            BufReader::new(file),
            self.index.segment_len(),
        )
    }
}
