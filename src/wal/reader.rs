//! Log Reader
//!
//! Handles reading records from the log file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{EmberError, Result};

use super::{LogRecord, HEADER_SIZE};

/// Reads records from a log file, front to back.
///
/// A record cut short by the end of the file marks the end of the log and
/// sets [`LogReader::was_truncated`]. A complete record that fails its
/// checksum is an error.
pub struct LogReader {
    path: PathBuf,
    reader: BufReader<File>,
    file_len: u64,
    /// Offset just past the last complete record
    position: u64,
    truncated: bool,
    finished: bool,
}

impl LogReader {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            file_len,
            position: 0,
            truncated: false,
            finished: false,
        })
    }

    /// Read the next record from the log
    pub fn next_record(&mut self) -> Result<Option<LogRecord>> {
        if self.finished {
            return Ok(None);
        }

        // Never read past the length seen at open
        let remaining = self.file_len.saturating_sub(self.position);
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(self.stop_truncated());
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;

        let payload_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if payload_len > remaining - HEADER_SIZE as u64 {
            return Ok(self.stop_truncated());
        }

        let mut payload = vec![0u8; payload_len as usize];
        self.reader.read_exact(&mut payload)?;

        if crc32fast::hash(&payload) != expected_crc {
            return Err(EmberError::corrupt(&self.path, self.position, "checksum mismatch"));
        }

        let record = LogRecord::deserialize(&payload).map_err(|e| {
            EmberError::corrupt(&self.path, self.position, format!("undecodable payload: {}", e))
        })?;
        if record.key.is_empty() {
            return Err(EmberError::corrupt(&self.path, self.position, "empty key"));
        }

        self.position += HEADER_SIZE as u64 + payload_len;
        Ok(Some(record))
    }

    /// Offset just past the last complete record read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether reading stopped at an incomplete trailing record
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Iterate over all remaining records
    pub fn records(self) -> LogIterator {
        LogIterator { reader: self }
    }

    fn stop_truncated(&mut self) -> Option<LogRecord> {
        tracing::warn!(
            path = %self.path.display(),
            offset = self.position,
            "discarding incomplete trailing log record"
        );
        self.truncated = true;
        self.finished = true;
        None
    }
}

/// Iterator over log records
pub struct LogIterator {
    reader: LogReader,
}

impl Iterator for LogIterator {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.reader.finished = true;
                Some(Err(e))
            }
        }
    }
}
