//! Tests for storage directory discovery
//!
//! These tests verify:
//! - Published segments are listed newest first
//! - Leftovers of an interrupted flush are removed
//! - Files belonging to other prefixes are ignored

use std::fs;

use emberkv::storage::{SegmentWriter, StoragePaths};
use emberkv::EmberError;
use tempfile::TempDir;

fn setup_paths() -> (TempDir, StoragePaths) {
    let temp_dir = TempDir::new().unwrap();
    let paths = StoragePaths::new(&temp_dir.path().join("ember")).unwrap();
    (temp_dir, paths)
}

fn write_segment(paths: &StoragePaths, id: u64) {
    SegmentWriter::new(paths, id)
        .write(vec![(format!("key{}", id).into_bytes(), b"v".to_vec())])
        .unwrap();
}

#[test]
fn test_empty_directory() {
    let (_temp, paths) = setup_paths();

    let discovery = paths.discover().unwrap();

    assert!(discovery.segment_ids.is_empty());
    assert_eq!(discovery.max_id, 0);
}

#[test]
fn test_segments_newest_first() {
    let (_temp, paths) = setup_paths();
    for id in [3, 1, 2] {
        write_segment(&paths, id);
    }

    let discovery = paths.discover().unwrap();

    assert_eq!(discovery.segment_ids, vec![3, 2, 1]);
    assert_eq!(discovery.max_id, 3);
}

#[test]
fn test_unpublished_segment_removed() {
    let (_temp, paths) = setup_paths();
    write_segment(&paths, 1);

    // Body written, index never renamed into place
    fs::write(paths.segment_path(2), b"partial body").unwrap();
    fs::write(paths.index_tmp_path(2), b"partial index").unwrap();

    let discovery = paths.discover().unwrap();

    assert_eq!(discovery.segment_ids, vec![1]);
    assert_eq!(discovery.max_id, 2);
    assert!(!paths.segment_path(2).exists());
    assert!(!paths.index_tmp_path(2).exists());
}

#[test]
fn test_index_without_body_is_error() {
    let (_temp, paths) = setup_paths();
    write_segment(&paths, 1);
    fs::remove_file(paths.segment_path(1)).unwrap();

    assert!(matches!(paths.discover(), Err(EmberError::Storage(_))));
}

#[test]
fn test_other_prefixes_ignored() {
    let (temp, paths) = setup_paths();
    let other = StoragePaths::new(&temp.path().join("other")).unwrap();
    write_segment(&other, 5);
    fs::write(paths.log_path(), b"").unwrap();

    let discovery = paths.discover().unwrap();

    assert!(discovery.segment_ids.is_empty());
    assert_eq!(discovery.max_id, 0);
}
