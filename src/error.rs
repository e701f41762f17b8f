//! Error types for EmberKV
//!
//! Provides a unified error type for all operations. A missing key is not an
//! error: lookups return `Ok(None)`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using EmberError
pub type Result<T> = std::result::Result<T, EmberError>;

/// Unified error type for EmberKV operations
#[derive(Debug, Error)]
pub enum EmberError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Data Integrity Errors
    // -------------------------------------------------------------------------
    /// A complete record in a log, segment or index failed to decode or verify.
    #[error("corrupt record in {} at offset {offset}: {reason}", path.display())]
    CorruptRecord {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Storage / Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    /// The memtable was frozen for flushing and no longer accepts writes.
    #[error("memtable is frozen")]
    MemTableFrozen,

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("Flush failed: {0}")]
    Flush(String),
}

impl EmberError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, offset: u64, reason: impl Into<String>) -> Self {
        EmberError::CorruptRecord {
            path: path.into(),
            offset,
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for EmberError {
    fn from(err: bincode::Error) -> Self {
        EmberError::Serialization(err.to_string())
    }
}
