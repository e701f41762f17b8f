//! MemTable implementation
//!
//! BTreeMap-based memtable backed by its own durable log.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::{LogSyncStrategy, Thresholds};
use crate::error::{EmberError, Result};
use crate::wal::{LogRecord, LogWriter, WalRecovery};

/// Settings a memtable needs from the engine configuration
#[derive(Debug, Clone, Copy)]
pub struct MemTableOptions {
    pub thresholds: Thresholds,
    pub sync_strategy: LogSyncStrategy,
}

impl Default for MemTableOptions {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            sync_strategy: LogSyncStrategy::EveryWrite,
        }
    }
}

/// Where the memtable's log stands
enum LogState {
    /// Accepting appends
    Open(LogWriter),
    /// Frozen for flushing; the log now lives at `log_path`
    Frozen { log_path: PathBuf },
    /// Frozen, and the log was removed once its segment was published
    Discarded,
    /// Closed on shutdown
    Closed,
}

/// In-memory table for recent writes, backed by an append-only log.
///
/// ## Concurrency:
/// - `log`: Mutex serializing appends, so two records never interleave
/// - `data`: RwLock, readers never wait on log I/O
/// - `size`: bytes appended to the log, updated under the `log` lock
pub struct MemTable {
    log_path: PathBuf,
    temp_log_path: Option<PathBuf>,
    options: MemTableOptions,
    log: Mutex<LogState>,
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    size: AtomicU64,
}

impl MemTable {
    /// Open a memtable, rebuilding it from existing logs.
    ///
    /// Replays `temp_log_path` (if given and present) and then `log_path`; the
    /// primary log wins for keys present in both. When a temp log was replayed,
    /// the merged contents are rewritten into a fresh primary log and the temp
    /// log is removed, so the next freeze has a free temp slot.
    pub fn open(log_path: &Path, temp_log_path: Option<&Path>, options: MemTableOptions) -> Result<Self> {
        Self::open_inner(log_path, temp_log_path, true, options)
    }

    /// Open the table that replaces a frozen one.
    ///
    /// The temp-log slot may still hold the frozen table's log, so only
    /// `log_path` is replayed; `temp_log_path` is where this table's own log
    /// will go when it is frozen in turn.
    pub fn open_successor(log_path: &Path, temp_log_path: Option<&Path>, options: MemTableOptions) -> Result<Self> {
        Self::open_inner(log_path, temp_log_path, false, options)
    }

    fn open_inner(
        log_path: &Path,
        temp_log_path: Option<&Path>,
        replay_temp: bool,
        options: MemTableOptions,
    ) -> Result<Self> {
        let mut data = BTreeMap::new();
        let mut carried_over = false;

        if let Some(temp) = temp_log_path.filter(|p| replay_temp && p.exists()) {
            let (records, result) = WalRecovery::recover(temp)?;
            tracing::info!(
                path = %temp.display(),
                records = result.records_recovered,
                truncated = result.was_truncated,
                "replayed temp log from an unfinished flush"
            );
            for record in records {
                data.insert(record.key, record.value);
            }
            carried_over = true;
        }

        let (records, result) = WalRecovery::recover(log_path)?;
        if result.records_recovered > 0 || result.was_truncated {
            tracing::info!(
                path = %log_path.display(),
                records = result.records_recovered,
                truncated = result.was_truncated,
                "replayed log"
            );
        }
        for record in records {
            data.insert(record.key, record.value);
        }

        if carried_over {
            Self::rewrite_log(log_path, &data, options.sync_strategy)?;
            if let Some(temp) = temp_log_path {
                remove_if_exists(temp)?;
            }
        }

        let writer = LogWriter::open(log_path, options.sync_strategy)?;
        let size = writer.len();

        Ok(Self {
            log_path: log_path.to_path_buf(),
            temp_log_path: temp_log_path.map(Path::to_path_buf),
            options,
            log: Mutex::new(LogState::Open(writer)),
            data: RwLock::new(data),
            size: AtomicU64::new(size),
        })
    }

    /// Set a key-value pair, returning the new log size.
    ///
    /// The record is appended to the log first; the map only changes once the
    /// append succeeded.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<u64> {
        if key.is_empty() {
            return Err(EmberError::InvalidArgument("key must not be empty".to_string()));
        }

        let mut log = self.log.lock();
        let writer = match &mut *log {
            LogState::Open(writer) => writer,
            LogState::Frozen { .. } | LogState::Discarded => {
                return Err(EmberError::MemTableFrozen)
            }
            LogState::Closed => return Err(EmberError::ShuttingDown),
        };

        let written = writer.append(&LogRecord::new(key, value))?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(self.size.fetch_add(written, Ordering::SeqCst) + written)
    }

    /// Get a value by key (read lock, no I/O)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Bytes appended to the log, including frame headers
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if either threshold has been met or exceeded
    pub fn is_full(&self) -> bool {
        self.options.thresholds.is_reached(self.key_count(), self.size())
    }

    pub fn thresholds(&self) -> Thresholds {
        self.options.thresholds
    }

    pub fn is_frozen(&self) -> bool {
        matches!(*self.log.lock(), LogState::Frozen { .. } | LogState::Discarded)
    }

    /// Whether the frozen log has already been removed
    pub fn is_log_discarded(&self) -> bool {
        matches!(*self.log.lock(), LogState::Discarded)
    }

    /// Freeze the table and move its log out of the way.
    ///
    /// After this call `set` fails with `MemTableFrozen`. The log is synced,
    /// closed, and renamed to the temp-log name when one is configured. Calling
    /// it again after a failed rename retries the rename.
    pub fn prepare_for_flush(&self) -> Result<()> {
        let mut log = self.log.lock();

        match mem::replace(&mut *log, LogState::Frozen { log_path: self.log_path.clone() }) {
            LogState::Open(writer) => writer.close()?,
            frozen @ LogState::Frozen { .. } => *log = frozen,
            LogState::Discarded => {
                *log = LogState::Discarded;
                return Ok(());
            }
            LogState::Closed => {
                *log = LogState::Closed;
                return Err(EmberError::ShuttingDown);
            }
        }

        let (Some(temp), LogState::Frozen { log_path }) = (&self.temp_log_path, &mut *log) else {
            return Ok(());
        };
        if log_path == temp {
            return Ok(());
        }
        if temp.exists() {
            return Err(EmberError::Storage(format!(
                "temp log {} already exists; previous flush has not finished",
                temp.display()
            )));
        }

        fs::rename(&*log_path, temp)?;
        *log_path = temp.clone();
        tracing::debug!(path = %temp.display(), keys = self.key_count(), "memtable frozen");
        Ok(())
    }

    /// Sorted copy of every (key, value) pair
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Where the frozen log currently lives, if the table is frozen
    pub fn frozen_log_path(&self) -> Option<PathBuf> {
        match &*self.log.lock() {
            LogState::Frozen { log_path } => Some(log_path.clone()),
            _ => None,
        }
    }

    /// Delete the frozen log once its contents are durable elsewhere
    pub fn discard_log(&self) -> Result<()> {
        let mut log = self.log.lock();
        match &*log {
            LogState::Frozen { log_path } => remove_if_exists(log_path)?,
            LogState::Discarded => return Ok(()),
            _ => {
                return Err(EmberError::Storage(
                    "only a frozen memtable can discard its log".to_string(),
                ))
            }
        }
        *log = LogState::Discarded;
        Ok(())
    }

    /// Sync and release the log file. A frozen table stays frozen.
    pub fn close(&self) -> Result<()> {
        let mut log = self.log.lock();
        match mem::replace(&mut *log, LogState::Closed) {
            LogState::Open(writer) => writer.close(),
            frozen @ (LogState::Frozen { .. } | LogState::Discarded) => {
                *log = frozen;
                Ok(())
            }
            LogState::Closed => Ok(()),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Replace `log_path` with a compacted log holding exactly `data`
    fn rewrite_log(log_path: &Path, data: &BTreeMap<Vec<u8>, Vec<u8>>, sync: LogSyncStrategy) -> Result<()> {
        let rewrite_path = with_suffix(log_path, ".rewrite");
        remove_if_exists(&rewrite_path)?;

        let mut writer = LogWriter::open(&rewrite_path, sync)?;
        for (key, value) in data {
            writer.append(&LogRecord::new(key.as_slice(), value.as_slice()))?;
        }
        writer.close()?;

        fs::rename(&rewrite_path, log_path)?;
        tracing::info!(path = %log_path.display(), keys = data.len(), "rewrote log after temp log replay");
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
