//! Segment Module
//!
//! Immutable on-disk sorted key-value storage. Every flush produces one
//! segment body plus a separate index file.
//!
//! ## Segment File
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                        │
//! │   Magic: "EMBS" (4) | Version: u16 (2)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Records (variable), sorted by key                       │
//! │   [KeyLen: u32][ValLen: u32][CRC(key+value): u32]       │
//! │   [Key][Value]                                          │
//! │   ... repeated for each entry ...                       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Index File
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (22 bytes)                                       │
//! │   Magic: "EMBI" (4) | Version: u16 (2)                  │
//! │   EntryCount: u64 (8) | SegmentLen: u64 (8)             │
//! ├─────────────────────────────────────────────────────────┤
//! │ Entries (variable), same order as the segment           │
//! │   [KeyLen: u32][Offset: u64][Key]                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                        │
//! │   CRC32 of everything above                             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The index is written to `*.index.tmp` and renamed into place only after
//! the segment body is durable, so a visible index always has a complete body.

mod index;
mod iterator;
mod reader;
mod writer;

use bytes::BufMut;

pub use index::{IndexEntry, SegmentIndex};
pub use iterator::SegmentIterator;
pub use reader::Segment;
pub use writer::SegmentWriter;

// =============================================================================
// Shared Constants (used by writer, index, reader, iterator)
// =============================================================================

/// Magic bytes identifying a segment body
pub(crate) const SEGMENT_MAGIC: &[u8; 4] = b"EMBS";

/// Magic bytes identifying a segment index
pub(crate) const INDEX_MAGIC: &[u8; 4] = b"EMBI";

/// Current format version for both files
pub(crate) const VERSION: u16 = 1;

/// Segment header: Magic (4) + Version (2)
pub(crate) const SEGMENT_HEADER_SIZE: u64 = 6;

/// Index header: Magic (4) + Version (2) + EntryCount (8) + SegmentLen (8)
pub(crate) const INDEX_HEADER_SIZE: usize = 22;

/// Index footer: CRC32 (4)
pub(crate) const INDEX_FOOTER_SIZE: usize = 4;

/// Record header: KeyLen (4) + ValLen (4) + CRC (4)
pub(crate) const ENTRY_HEADER_SIZE: usize = 12;

/// Append one segment record to `buf`
pub(crate) fn encode_entry(buf: &mut impl BufMut, key: &[u8], value: &[u8]) {
    buf.put_u32_le(key.len() as u32);
    buf.put_u32_le(value.len() as u32);
    buf.put_u32_le(entry_crc(key, value));
    buf.put_slice(key);
    buf.put_slice(value);
}

/// Checksum covering a record's key and value
pub(crate) fn entry_crc(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Decoded record header
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryHeader {
    pub key_len: usize,
    pub value_len: usize,
    pub crc: u32,
}

impl EntryHeader {
    pub(crate) fn parse(bytes: &[u8; ENTRY_HEADER_SIZE]) -> Self {
        Self {
            key_len: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize,
            value_len: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize,
            crc: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    /// Total record size including the header
    pub(crate) fn record_len(&self) -> u64 {
        (ENTRY_HEADER_SIZE + self.key_len + self.value_len) as u64
    }
}
