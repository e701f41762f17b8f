//! Log Writer
//!
//! Handles appending records to the log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::LogSyncStrategy;
use crate::error::Result;

use super::LogRecord;

/// Appends records to a log file.
///
/// The file handle is owned by the writer; dropping or closing the writer
/// releases it.
pub struct LogWriter {
    path: PathBuf,
    file: File,
    sync_strategy: LogSyncStrategy,
    /// Records appended since the last fsync
    uncommitted: usize,
    /// Length of the file up to the last complete record
    len: u64,
}

impl LogWriter {
    /// Open or create a log file for appending
    pub fn open(path: &Path, sync_strategy: LogSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sync_strategy,
            uncommitted: 0,
            len,
        })
    }

    /// Append a record, returning the number of bytes written.
    ///
    /// The whole frame goes out in one `write_all`. If that fails the file is
    /// cut back to the previous record boundary.
    pub fn append(&mut self, record: &LogRecord) -> Result<u64> {
        let frame = record.serialize()?;

        if let Err(err) = self.file.write_all(&frame) {
            if let Err(truncate_err) = self.file.set_len(self.len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "failed to roll back partial log append"
                );
            }
            return Err(err.into());
        }

        let written = frame.len() as u64;
        self.len += written;
        self.uncommitted += 1;

        let should_sync = match self.sync_strategy {
            LogSyncStrategy::EveryWrite => true,
            LogSyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };
        if should_sync {
            self.sync()?;
        }

        Ok(written)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Sync and release the file handle
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        self.sync()
    }

    /// Records appended but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Bytes in the file, up to the last complete record
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if self.uncommitted > 0 {
            if let Err(err) = self.file.sync_data() {
                tracing::warn!(path = %self.path.display(), error = %err, "log sync on drop failed");
            }
        }
    }
}
