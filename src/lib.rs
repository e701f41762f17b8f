//! # EmberKV
//!
//! The write path and lookup machinery of a log-structured key-value store:
//! - A memtable made durable by an append-only, checksummed log
//! - Crash recovery that discards a torn trailing record
//! - Threshold-triggered freeze and flush to immutable sorted segments
//! - Point lookups across the memtable and segments, newest first
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │        set / get / flush / close, transition lock           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  MemTable   │─freeze──▶│ Flush worker│
//!   │ (log-backed)│          │ (crossbeam) │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     Log     │          │  Segments   │
//!   │  (Append)   │          │ body + index│
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use emberkv::{Config, Engine};
//!
//! let config = Config::builder()
//!     .storage_prefix("/var/lib/emberkv/ember")
//!     .key_threshold(10_000)
//!     .build();
//! let engine = Engine::open(config)?;
//! engine.set(b"a", b"1")?;
//! assert_eq!(engine.get(b"a")?, Some(b"1".to_vec()));
//! engine.close()?;
//! # Ok::<(), emberkv::EmberError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EmberError, Result};
pub use config::{Config, LogSyncStrategy};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
