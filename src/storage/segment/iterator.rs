//! Segment Iterator
//!
//! Sequential iteration over all records in a segment.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::error::{EmberError, Result};

use super::{entry_crc, EntryHeader, ENTRY_HEADER_SIZE, SEGMENT_HEADER_SIZE};

/// Iterator over segment records in sorted key order
pub struct SegmentIterator {
    path: PathBuf,
    file: BufReader<File>,
    /// Stop reading when we reach this offset (end of body)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
    failed: bool,
}

impl SegmentIterator {
    /// Create a new iterator starting after the segment header
    pub(super) fn new(path: PathBuf, mut file: BufReader<File>, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(SEGMENT_HEADER_SIZE))?;
        Ok(Self {
            path,
            file,
            end_offset,
            current_offset: SEGMENT_HEADER_SIZE,
            failed: false,
        })
    }

    fn read_record(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let header = EntryHeader::parse(&header);

        if self.current_offset + header.record_len() > self.end_offset {
            return Err(EmberError::corrupt(
                &self.path,
                self.current_offset,
                "record runs past segment end",
            ));
        }

        let mut key = vec![0u8; header.key_len];
        self.file.read_exact(&mut key)?;
        let mut value = vec![0u8; header.value_len];
        self.file.read_exact(&mut value)?;

        if entry_crc(&key, &value) != header.crc {
            return Err(EmberError::corrupt(&self.path, self.current_offset, "checksum mismatch"));
        }

        self.current_offset += header.record_len();
        Ok((key, value))
    }
}

impl Iterator for SegmentIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let item = self.read_record();
        self.failed = item.is_err();
        Some(item)
    }
}
