//! Tests for MemTable
//!
//! These tests verify:
//! - Basic set/get with last-write-wins
//! - Key and size thresholds
//! - Rebuilding from the log and the temp log
//! - Freezing, discarding and closing
//! - A failed log append leaves the table unchanged

use std::fs;
use std::path::{Path, PathBuf};

use emberkv::config::{LogSyncStrategy, Thresholds};
use emberkv::memtable::{MemTable, MemTableOptions};
use emberkv::wal::{LogRecord, LogWriter, WalRecovery};
use emberkv::EmberError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestPaths {
    _temp: TempDir,
    log: PathBuf,
    temp_log: PathBuf,
}

fn setup_paths() -> TestPaths {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("ember.log");
    let temp_log = temp.path().join("ember.log.temp");
    TestPaths {
        _temp: temp,
        log,
        temp_log,
    }
}

fn options(key_threshold: Option<usize>, size_threshold: Option<u64>) -> MemTableOptions {
    MemTableOptions {
        thresholds: Thresholds::resolve(key_threshold, size_threshold),
        sync_strategy: LogSyncStrategy::EveryWrite,
    }
}

fn write_log(path: &Path, pairs: &[(&str, &str)]) {
    let mut writer = LogWriter::open(path, LogSyncStrategy::EveryWrite).unwrap();
    for (key, value) in pairs {
        writer.append(&LogRecord::new(*key, *value)).unwrap();
    }
    writer.close().unwrap();
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_set_and_get() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();

    table.set(b"a", b"1").unwrap();

    assert_eq!(table.get(b"a"), Some(b"1".to_vec()));
    assert_eq!(table.get(b"missing"), None);
    assert!(paths.log.exists());
}

#[test]
fn test_last_write_wins() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();

    table.set(b"a", b"1").unwrap();
    table.set(b"a", b"2").unwrap();

    assert_eq!(table.get(b"a"), Some(b"2".to_vec()));
    assert_eq!(table.key_count(), 1);
}

#[test]
fn test_empty_key_rejected() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();

    let err = table.set(b"", b"value").unwrap_err();

    assert!(matches!(err, EmberError::InvalidArgument(_)));
    assert_eq!(table.size(), 0);
}

#[test]
fn test_size_counts_log_bytes() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();

    let first = table.set(b"a", b"1").unwrap();
    let second = table.set(b"a", b"22").unwrap();

    assert!(second > first);
    assert_eq!(table.size(), second);
    assert_eq!(fs::metadata(&paths.log).unwrap().len(), second);
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_append_leaves_table_unchanged() {
    let paths = setup_paths();
    // Every write to /dev/full fails with ENOSPC
    std::os::unix::fs::symlink("/dev/full", &paths.log).unwrap();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();

    let err = table.set(b"a", b"1").unwrap_err();

    assert!(matches!(err, EmberError::Io(_)));
    assert_eq!(table.get(b"a"), None);
    assert_eq!(table.size(), 0);
    assert_eq!(table.key_count(), 0);
}

// =============================================================================
// Thresholds
// =============================================================================

#[test]
fn test_key_threshold() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, options(Some(3), None)).unwrap();

    table.set(b"a", b"1").unwrap();
    table.set(b"b", b"2").unwrap();
    table.set(b"b", b"3").unwrap();
    assert!(!table.is_full());

    table.set(b"c", b"4").unwrap();
    assert!(table.is_full());
}

#[test]
fn test_size_threshold() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, options(None, Some(20))).unwrap();
    assert!(!table.is_full());

    table.set(b"k", &[b'x'; 20]).unwrap();

    assert!(table.size() >= 20);
    assert!(table.is_full());
}

#[test]
fn test_zero_threshold_is_always_full() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, options(Some(0), None)).unwrap();

    assert!(table.is_empty());
    assert!(table.is_full());
}

// =============================================================================
// Recovery
// =============================================================================

#[test]
fn test_reopen_replays_log() {
    let paths = setup_paths();
    {
        let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();
        table.set(b"a", b"1").unwrap();
        table.set(b"b", b"2").unwrap();
        table.set(b"a", b"3").unwrap();
        table.close().unwrap();
    }

    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();

    assert_eq!(table.get(b"a"), Some(b"3".to_vec()));
    assert_eq!(table.get(b"b"), Some(b"2".to_vec()));
    assert_eq!(table.size(), fs::metadata(&paths.log).unwrap().len());
}

#[test]
fn test_temp_log_replayed_with_primary_winning() {
    let paths = setup_paths();
    write_log(&paths.temp_log, &[("a", "old"), ("b", "temp")]);
    write_log(&paths.log, &[("a", "new"), ("c", "primary")]);

    let table = MemTable::open(
        &paths.log,
        Some(paths.temp_log.as_path()),
        MemTableOptions::default(),
    )
    .unwrap();

    assert_eq!(table.get(b"a"), Some(b"new".to_vec()));
    assert_eq!(table.get(b"b"), Some(b"temp".to_vec()));
    assert_eq!(table.get(b"c"), Some(b"primary".to_vec()));

    // Merged contents now live in the primary log alone
    assert!(!paths.temp_log.exists());
    let (records, _) = WalRecovery::recover(&paths.log).unwrap();
    assert_eq!(records.len(), 3);
}

#[test]
fn test_successor_ignores_temp_log() {
    let paths = setup_paths();
    write_log(&paths.temp_log, &[("frozen", "1")]);

    let table = MemTable::open_successor(
        &paths.log,
        Some(paths.temp_log.as_path()),
        MemTableOptions::default(),
    )
    .unwrap();

    assert_eq!(table.get(b"frozen"), None);
    assert!(paths.temp_log.exists());
}

// =============================================================================
// Freeze and Close
// =============================================================================

#[test]
fn test_prepare_for_flush_moves_log() {
    let paths = setup_paths();
    let table = MemTable::open(
        &paths.log,
        Some(paths.temp_log.as_path()),
        MemTableOptions::default(),
    )
    .unwrap();
    table.set(b"a", b"1").unwrap();

    table.prepare_for_flush().unwrap();

    assert!(table.is_frozen());
    assert!(!paths.log.exists());
    assert!(paths.temp_log.exists());
    assert_eq!(table.frozen_log_path(), Some(paths.temp_log.clone()));
    assert!(matches!(table.set(b"b", b"2"), Err(EmberError::MemTableFrozen)));

    // Reads keep working while frozen
    assert_eq!(table.get(b"a"), Some(b"1".to_vec()));
    assert_eq!(table.snapshot(), vec![(b"a".to_vec(), b"1".to_vec())]);

    // Idempotent
    table.prepare_for_flush().unwrap();

    table.discard_log().unwrap();
    assert!(!paths.temp_log.exists());
}

#[test]
fn test_prepare_for_flush_without_temp_log() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();
    table.set(b"a", b"1").unwrap();

    table.prepare_for_flush().unwrap();

    assert_eq!(table.frozen_log_path(), Some(paths.log.clone()));
    assert!(paths.log.exists());
}

#[test]
fn test_prepare_for_flush_refuses_occupied_temp_slot() {
    let paths = setup_paths();
    let table = MemTable::open_successor(
        &paths.log,
        Some(paths.temp_log.as_path()),
        MemTableOptions::default(),
    )
    .unwrap();
    table.set(b"a", b"1").unwrap();
    write_log(&paths.temp_log, &[("other", "1")]);

    assert!(matches!(table.prepare_for_flush(), Err(EmberError::Storage(_))));
    assert!(paths.log.exists());
}

#[test]
fn test_discarded_table_stays_frozen() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();
    table.set(b"a", b"1").unwrap();
    table.prepare_for_flush().unwrap();

    table.discard_log().unwrap();

    assert!(table.is_log_discarded());
    assert!(table.is_frozen());
    assert!(!paths.log.exists());
    assert_eq!(table.frozen_log_path(), None);

    // Repeating the freeze or the discard does nothing
    table.prepare_for_flush().unwrap();
    table.discard_log().unwrap();
    table.close().unwrap();
    assert!(table.is_log_discarded());
    assert!(!paths.log.exists());

    assert!(matches!(table.set(b"b", b"2"), Err(EmberError::MemTableFrozen)));
    assert_eq!(table.get(b"a"), Some(b"1".to_vec()));
}

#[test]
fn test_discard_requires_frozen() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();

    assert!(table.discard_log().is_err());
    assert!(paths.log.exists());
}

#[test]
fn test_set_after_close_fails() {
    let paths = setup_paths();
    let table = MemTable::open(&paths.log, None, MemTableOptions::default()).unwrap();
    table.set(b"a", b"1").unwrap();

    table.close().unwrap();
    table.close().unwrap();

    assert!(matches!(table.set(b"b", b"2"), Err(EmberError::ShuttingDown)));
    assert_eq!(table.get(b"a"), Some(b"1".to_vec()));
}
