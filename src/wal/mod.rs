//! Durable Log Module
//!
//! Provides durability guarantees through append-only logging. Every memtable
//! owns one log; replaying it in order rebuilds the memtable exactly.
//!
//! ## Responsibilities
//! - Append records before any in-memory mutation
//! - CRC32 checksums for corruption detection
//! - Crash recovery and replay, discarding a torn trailing record
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode payload │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode payload │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod record;
mod writer;
mod reader;
mod recovery;

pub use record::{LogRecord, HEADER_SIZE};
pub use writer::LogWriter;
pub use reader::{LogIterator, LogReader};
pub use recovery::{RecoveryResult, WalRecovery};
