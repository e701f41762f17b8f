//! Segment Index
//!
//! Sorted (key, offset) pairs locating each record inside a segment body.

use std::fs;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{EmberError, Result};

use super::{INDEX_FOOTER_SIZE, INDEX_HEADER_SIZE, INDEX_MAGIC, VERSION};

/// One index entry: where a key's record starts in the segment body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub offset: u64,
}

/// In-memory copy of a segment index.
///
/// Lookups go through [`SegmentIndex::find`] only, so the entry storage can
/// move to a mapped or paged form without touching callers.
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    entries: Vec<IndexEntry>,
    segment_len: u64,
}

impl SegmentIndex {
    pub(crate) fn new(entries: Vec<IndexEntry>, segment_len: u64) -> Self {
        Self {
            entries,
            segment_len,
        }
    }

    /// Serialize to the index file layout, footer included
    pub(crate) fn encode(&self) -> Vec<u8> {
        let body_len: usize = self
            .entries
            .iter()
            .map(|e| 12 + e.key.len())
            .sum();
        let mut buf = BytesMut::with_capacity(INDEX_HEADER_SIZE + body_len + INDEX_FOOTER_SIZE);

        buf.put_slice(INDEX_MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u64_le(self.entries.len() as u64);
        buf.put_u64_le(self.segment_len);

        for entry in &self.entries {
            buf.put_u32_le(entry.key.len() as u32);
            buf.put_u64_le(entry.offset);
            buf.put_slice(&entry.key);
        }

        let crc = crc32fast::hash(&buf);
        buf.put_u32_le(crc);
        buf.to_vec()
    }

    /// Load and validate an index file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let corrupt = |offset: usize, reason: &str| EmberError::corrupt(path, offset as u64, reason);

        if data.len() < INDEX_HEADER_SIZE + INDEX_FOOTER_SIZE {
            return Err(corrupt(0, "index shorter than header and footer"));
        }

        let body_end = data.len() - INDEX_FOOTER_SIZE;
        let mut footer = &data[body_end..];
        if crc32fast::hash(&data[..body_end]) != footer.get_u32_le() {
            return Err(corrupt(body_end, "index checksum mismatch"));
        }

        let mut buf = &data[..body_end];
        if &buf[..4] != INDEX_MAGIC {
            return Err(corrupt(0, "invalid index magic"));
        }
        buf.advance(4);

        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(corrupt(4, &format!("unsupported index version {}", version)));
        }
        let entry_count = buf.get_u64_le();
        let segment_len = buf.get_u64_le();

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(entry_count.min(1 << 20) as usize);
        for _ in 0..entry_count {
            let at = body_end - buf.remaining();
            if buf.remaining() < 12 {
                return Err(corrupt(at, "index entry header cut short"));
            }
            let key_len = buf.get_u32_le() as usize;
            let offset = buf.get_u64_le();
            if buf.remaining() < key_len {
                return Err(corrupt(at, "index key cut short"));
            }
            let key = buf[..key_len].to_vec();
            buf.advance(key_len);

            if entries.last().is_some_and(|prev| prev.key >= key) {
                return Err(corrupt(at, "index keys out of order"));
            }
            entries.push(IndexEntry { key, offset });
        }

        if buf.has_remaining() {
            return Err(corrupt(body_end - buf.remaining(), "trailing bytes after index entries"));
        }

        Ok(Self {
            entries,
            segment_len,
        })
    }

    /// Binary search for an exact key, returning its record offset
    pub fn find(&self, key: &[u8]) -> Option<u64> {
        self.entries
            .binary_search_by(|entry| entry.key.as_slice().cmp(key))
            .ok()
            .map(|i| self.entries[i].offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the segment body this index describes
    pub fn segment_len(&self) -> u64 {
        self.segment_len
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.entries.first().map(|e| e.key.as_slice())
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.entries.last().map(|e| e.key.as_slice())
    }
}
