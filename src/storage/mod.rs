//! Storage Module
//!
//! Persistent storage layer: immutable segments produced by memtable flushes.
//!
//! ## Responsibilities
//! - Persist frozen memtables to disk in sorted order
//! - Point lookups through a per-segment index
//! - Name every file from the storage prefix and rediscover segments on startup
//!
//! ## Layout (prefix `{dir}/{name}`)
//! ```text
//! {dir}/
//!   ├── {name}.log                   active log (see wal)
//!   ├── {name}.log.temp              frozen log awaiting flush
//!   ├── {name}.0000000001.segment    sorted records
//!   ├── {name}.0000000001.index      key → offset
//!   └── ...
//! ```

mod paths;
mod segment;

pub use paths::{Discovery, StoragePaths};
pub use segment::{IndexEntry, Segment, SegmentIndex, SegmentIterator, SegmentWriter};
