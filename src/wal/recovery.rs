//! Log Recovery
//!
//! Handles crash recovery by replaying the log.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use crate::error::Result;

use super::{LogReader, LogRecord};

/// Handles log recovery after a crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully recovered
    pub records_recovered: u64,

    /// Bytes covered by complete records
    pub valid_bytes: u64,

    /// Whether an incomplete trailing record was found (and, for
    /// [`WalRecovery::recover`], cut off)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover records from a log file
    ///
    /// This will:
    /// 1. Treat a missing file as an empty log
    /// 2. Read all complete records in order
    /// 3. Fail on a complete record that is corrupt
    /// 4. Truncate an incomplete trailing record so appends resume cleanly
    pub fn recover(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        let (records, result) = Self::scan(path)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_bytes)?;
            file.sync_all()?;
            tracing::info!(
                path = %path.display(),
                valid_bytes = result.valid_bytes,
                "truncated torn tail of log"
            );
        }

        Ok((records, result))
    }

    /// Verify integrity of a log file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path).map(|(_, result)| result)
    }

    fn scan(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        let mut reader = match LogReader::open(path) {
            Ok(reader) => reader,
            Err(crate::EmberError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Ok((Vec::new(), RecoveryResult::default()));
            }
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        while let Some(record) = reader.next_record()? {
            records.push(record);
        }

        let result = RecoveryResult {
            records_recovered: records.len() as u64,
            valid_bytes: reader.position(),
            was_truncated: reader.was_truncated(),
        };
        Ok((records, result))
    }
}
