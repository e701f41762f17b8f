//! MemTable Module
//!
//! In-memory data structure for recent writes, made durable by its own log.
//!
//! ## Responsibilities
//! - Log-first writes: a record is in memory only once it is in the log
//! - Single-writer/multi-reader access pattern
//! - Track log bytes and key count for flush triggers
//! - Freeze and hand its log over for flushing
//!
//! ## Data Structure Choice
//! Using BTreeMap wrapped in RwLock:
//! - Ordered keys (required for segment generation)
//! - Simple and correct first, optimize later

mod table;

pub use table::{MemTable, MemTableOptions};
