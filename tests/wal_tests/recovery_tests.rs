//! Tests for WalRecovery
//!
//! These tests verify:
//! - A missing log recovers as empty
//! - A torn trailing record is dropped and cut off the file
//! - Verify reports the same without touching the file

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use emberkv::config::LogSyncStrategy;
use emberkv::wal::{LogRecord, LogWriter, RecoveryResult, WalRecovery};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ember.log");
    (temp_dir, path)
}

/// Write well-formed records, returning the log length
fn write_records(path: &Path, count: usize) -> u64 {
    let mut writer = LogWriter::open(path, LogSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(&LogRecord::new(format!("key{}", i), format!("value{}", i)))
            .unwrap();
    }
    let len = writer.len();
    writer.close().unwrap();
    len
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_missing_log_is_empty() {
    let (_temp, path) = setup_temp_log();

    let (records, result) = WalRecovery::recover(&path).unwrap();

    assert!(records.is_empty());
    assert_eq!(result, RecoveryResult::default());
    assert!(!path.exists());
}

#[test]
fn test_clean_log_recovers_everything() {
    let (_temp, path) = setup_temp_log();
    let len = write_records(&path, 5);

    let (records, result) = WalRecovery::recover(&path).unwrap();

    assert_eq!(records.len(), 5);
    assert_eq!(result.records_recovered, 5);
    assert_eq!(result.valid_bytes, len);
    assert!(!result.was_truncated);
}

#[test]
fn test_torn_header_is_truncated() {
    let (_temp, path) = setup_temp_log();
    let len = write_records(&path, 3);
    append_raw(&path, &[0x10, 0x00, 0x00]);

    let (records, result) = WalRecovery::recover(&path).unwrap();

    assert_eq!(records.len(), 3);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&path).unwrap().len(), len);
}

#[test]
fn test_torn_payload_is_truncated() {
    let (_temp, path) = setup_temp_log();
    let len = write_records(&path, 2);

    let frame = LogRecord::new(b"partial".to_vec(), b"record".to_vec())
        .serialize()
        .unwrap();
    append_raw(&path, &frame[..frame.len() - 3]);

    let (records, result) = WalRecovery::recover(&path).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1].key, b"key1");
    assert!(result.was_truncated);
    assert_eq!(result.valid_bytes, len);
    assert_eq!(fs::metadata(&path).unwrap().len(), len);

    // Appends resume on a record boundary
    write_records(&path, 1);
    let (records, result) = WalRecovery::recover(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert!(!result.was_truncated);
}

#[test]
fn test_verify_does_not_modify() {
    let (_temp, path) = setup_temp_log();
    let len = write_records(&path, 2);
    append_raw(&path, &[1, 2, 3, 4, 5]);

    let result = WalRecovery::verify(&path).unwrap();

    assert_eq!(result.records_recovered, 2);
    assert_eq!(result.valid_bytes, len);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&path).unwrap().len(), len + 5);
}
