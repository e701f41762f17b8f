//! Configuration for EmberKV
//!
//! Centralized configuration with sensible defaults, validated once when the
//! engine opens.

use std::path::{Path, PathBuf};

use crate::error::{EmberError, Result};

/// Size threshold applied when neither a key nor a size threshold is configured (4 MiB)
pub const DEFAULT_SIZE_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Main configuration for an EmberKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Name prefix for every file the engine owns.
    /// With prefix `{dir}/{name}`:
    ///   {dir}/
    ///     ├── {name}.log                      (active durable log)
    ///     ├── {name}.log.temp                 (frozen log awaiting flush)
    ///     ├── {name}.0000000001.segment       (sorted records)
    ///     └── {name}.0000000001.index         (key → offset)
    pub storage_prefix: PathBuf,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Flush once the memtable holds this many distinct keys
    pub key_threshold: Option<usize>,

    /// Flush once this many bytes have been appended to the memtable's log
    pub size_threshold: Option<u64>,

    /// Rename the frozen log to `{prefix}.log.temp` and replay it on startup
    pub use_temp_log: bool,

    /// Write segments on a background worker instead of inside `set`
    pub background_flush: bool,

    // -------------------------------------------------------------------------
    // Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the log
    pub sync_strategy: LogSyncStrategy,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Resolved flush thresholds for a memtable.
///
/// `None` means unlimited. At least one threshold is always set after
/// [`Thresholds::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub key_threshold: Option<usize>,
    pub size_threshold: Option<u64>,
}

impl Thresholds {
    /// Apply the default size threshold when neither limit is configured
    pub fn resolve(key_threshold: Option<usize>, size_threshold: Option<u64>) -> Self {
        match (key_threshold, size_threshold) {
            (None, None) => Self {
                key_threshold: None,
                size_threshold: Some(DEFAULT_SIZE_THRESHOLD),
            },
            _ => Self {
                key_threshold,
                size_threshold,
            },
        }
    }

    /// True when either configured limit is met or exceeded
    pub fn is_reached(&self, key_count: usize, size: u64) -> bool {
        let keys_reached = self.key_threshold.is_some_and(|limit| key_count >= limit);
        let size_reached = self.size_threshold.is_some_and(|limit| size >= limit);
        keys_reached || size_reached
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_prefix: PathBuf::from("./emberkv_data/ember"),
            key_threshold: None,
            size_threshold: None,
            use_temp_log: true,
            background_flush: true,
            sync_strategy: LogSyncStrategy::EveryWrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Effective thresholds, with defaults applied
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::resolve(self.key_threshold, self.size_threshold)
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let name = self
            .storage_prefix
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.is_empty() {
            return Err(EmberError::Config(format!(
                "storage prefix {:?} must end in a file name",
                self.storage_prefix
            )));
        }

        if let LogSyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(EmberError::Config(
                "sync strategy EveryNEntries requires a count above zero".to_string(),
            ));
        }

        if self.background_flush && !self.use_temp_log {
            return Err(EmberError::Config(
                "background flush requires use_temp_log".to_string(),
            ));
        }

        Ok(())
    }

    pub fn storage_prefix(&self) -> &Path {
        &self.storage_prefix
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the storage prefix (directory plus file name stem)
    pub fn storage_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.storage_prefix = prefix.into();
        self
    }

    /// Set the key-count threshold
    pub fn key_threshold(mut self, keys: usize) -> Self {
        self.config.key_threshold = Some(keys);
        self
    }

    /// Set the log-size threshold (in bytes)
    pub fn size_threshold(mut self, bytes: u64) -> Self {
        self.config.size_threshold = Some(bytes);
        self
    }

    /// Enable or disable the temp-log handoff
    pub fn use_temp_log(mut self, enabled: bool) -> Self {
        self.config.use_temp_log = enabled;
        self
    }

    /// Enable or disable background flushing
    pub fn background_flush(mut self, enabled: bool) -> Self {
        self.config.background_flush = enabled;
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: LogSyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
