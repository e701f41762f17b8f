//! Storage Paths
//!
//! Derives every file name from the configured storage prefix and discovers
//! existing segments on startup.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EmberError, Result};

const LOG_SUFFIX: &str = "log";
const TEMP_LOG_SUFFIX: &str = "log.temp";
const SEGMENT_SUFFIX: &str = "segment";
const INDEX_SUFFIX: &str = "index";
const INDEX_TMP_SUFFIX: &str = "index.tmp";

/// File layout for one storage prefix `{dir}/{name}`
#[derive(Debug, Clone)]
pub struct StoragePaths {
    dir: PathBuf,
    name: String,
}

/// Result of scanning the storage directory
#[derive(Debug, Default)]
pub struct Discovery {
    /// Ids with both a segment body and a published index, newest first
    pub segment_ids: Vec<u64>,
    /// Highest id seen in any segment-related file
    pub max_id: u64,
}

impl StoragePaths {
    pub fn new(prefix: &Path) -> Result<Self> {
        let name = prefix
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                EmberError::Config(format!("storage prefix {:?} has no file name", prefix))
            })?
            .to_string();

        let dir = match prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self { dir, name })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.file(LOG_SUFFIX)
    }

    pub fn temp_log_path(&self) -> PathBuf {
        self.file(TEMP_LOG_SUFFIX)
    }

    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.file(&format!("{:010}.{}", id, SEGMENT_SUFFIX))
    }

    pub fn index_path(&self, id: u64) -> PathBuf {
        self.file(&format!("{:010}.{}", id, INDEX_SUFFIX))
    }

    pub fn index_tmp_path(&self, id: u64) -> PathBuf {
        self.file(&format!("{:010}.{}", id, INDEX_TMP_SUFFIX))
    }

    /// Scan the directory for segments.
    ///
    /// A segment counts only once its index has been renamed into place.
    /// Bodies without an index and leftover `*.index.tmp` files come from an
    /// interrupted flush and are removed; their data is still in a log.
    pub fn discover(&self) -> Result<Discovery> {
        let mut bodies = Vec::new();
        let mut indexes = Vec::new();
        let mut discovery = Discovery::default();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let Some((id, suffix)) = self.parse_segment_file(&entry.file_name()) else {
                continue;
            };
            discovery.max_id = discovery.max_id.max(id);

            match suffix.as_str() {
                SEGMENT_SUFFIX => bodies.push(id),
                INDEX_SUFFIX => indexes.push(id),
                INDEX_TMP_SUFFIX => {
                    tracing::warn!(segment_id = id, "removing unpublished segment index");
                    fs::remove_file(entry.path())?;
                }
                _ => {}
            }
        }

        for id in &bodies {
            if !indexes.contains(id) {
                tracing::warn!(segment_id = id, "removing segment body without an index");
                fs::remove_file(self.segment_path(*id))?;
            }
        }

        for id in &indexes {
            if !bodies.contains(id) {
                return Err(EmberError::Storage(format!(
                    "segment index {} has no segment body",
                    self.index_path(*id).display()
                )));
            }
        }

        // Newest first (highest id first)
        indexes.sort_unstable_by(|a, b| b.cmp(a));
        discovery.segment_ids = indexes;
        Ok(discovery)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, suffix))
    }

    /// "{name}.0000000042.segment" → Some((42, "segment"))
    fn parse_segment_file(&self, file_name: &OsString) -> Option<(u64, String)> {
        let file_name = file_name.to_str()?;
        let rest = file_name.strip_prefix(&self.name)?.strip_prefix('.')?;
        let (id_str, suffix) = rest.split_once('.')?;
        if id_str.is_empty() || !id_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id = id_str.parse().ok()?;
        Some((id, suffix.to_string()))
    }
}
