//! Engine Module
//!
//! The core storage engine that coordinates the memtable and its segments.
//!
//! ## Responsibilities
//! - Route `set` to the active memtable and `get` across every generation
//! - Freeze a full memtable, install its successor and flush it to a segment
//! - Rebuild state from the log, temp log and segment files on startup
//!
//! ## Lifecycle of a memtable
//! ```text
//!   Active ──is_full()──▶ Frozen ──segment written──▶ Flushed (log removed)
//!     ▲                     │
//!     └── successor ────────┘ installed in the same state swap
//! ```

mod flush;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{EmberError, Result};
use crate::memtable::{MemTable, MemTableOptions};
use crate::storage::{Segment, SegmentWriter, StoragePaths};

use self::flush::FlushWorker;

/// A frozen memtable waiting for its segment
#[derive(Clone)]
struct FrozenTable {
    memtable: Arc<MemTable>,
    segment_id: u64,
}

/// Everything a reader needs, swapped atomically under one lock
struct EngineState {
    /// The only memtable accepting writes
    active: Arc<MemTable>,
    /// Frozen memtable whose segment is not yet published
    frozen: Option<FrozenTable>,
    /// Published segments, newest first
    segments: Vec<Arc<Segment>>,
}

/// State shared between the engine and its flush worker
pub(crate) struct EngineShared {
    paths: StoragePaths,
    memtable_options: MemTableOptions,
    use_temp_log: bool,
    state: RwLock<EngineState>,
    next_segment_id: AtomicU64,
}

impl EngineShared {
    fn active(&self) -> Arc<MemTable> {
        Arc::clone(&self.state.read().active)
    }

    fn temp_log_path(&self) -> Option<PathBuf> {
        self.use_temp_log.then(|| self.paths.temp_log_path())
    }

    /// Open the memtable that takes over from a frozen one
    fn open_successor(&self) -> Result<MemTable> {
        MemTable::open_successor(
            &self.paths.log_path(),
            self.temp_log_path().as_deref(),
            self.memtable_options,
        )
    }

    /// Write the frozen memtable (if any) to its segment and publish it.
    ///
    /// The segment becomes visible and the frozen table disappears in the same
    /// state swap. The frozen log is removed only after that.
    pub(crate) fn flush_frozen(&self) -> Result<()> {
        let Some(frozen) = self.state.read().frozen.clone() else {
            return Ok(());
        };

        let snapshot = frozen.memtable.snapshot();
        let keys = snapshot.len();
        let segment = SegmentWriter::new(&self.paths, frozen.segment_id).write(snapshot)?;

        {
            let mut state = self.state.write();
            state.segments.insert(0, Arc::new(segment));
            state.frozen = None;
        }

        frozen.memtable.discard_log()?;
        tracing::info!(segment_id = frozen.segment_id, keys, "flushed memtable to segment");
        Ok(())
    }
}

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Reads** (get): take the state read lock just long enough to clone the
///   active memtable, the frozen memtable and the segment list, then search
///   them without holding any engine lock.
///
/// - **Writes** (set): go straight to the active memtable, whose own mutex
///   serializes log appends. A write that lands on a memtable frozen by a
///   concurrent transition waits on `transition_lock` and retries against the
///   successor, so no write is dropped.
///
/// - **Transitions** (freeze + flush): serialized by `transition_lock`. The
///   state write lock is held only for the pointer swaps.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// State shared with the flush worker
    shared: Arc<EngineShared>,

    /// Background flush thread (None when flushing inline or after close)
    worker: Mutex<Option<FlushWorker>>,

    /// Serializes freeze-and-flush transitions and shutdown
    transition_lock: Mutex<()>,

    closed: AtomicBool,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config and create the storage directory
    /// 2. Discover segments, dropping leftovers of interrupted flushes
    /// 3. Rebuild the active memtable from the temp log and log
    /// 4. Start the flush worker
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Validate and prepare the directory
        config.validate()?;
        let paths = StoragePaths::new(&config.storage_prefix)?;
        fs::create_dir_all(paths.dir())?;

        // Step 2: Load existing segments, newest first
        let discovery = paths.discover()?;
        let segments = discovery
            .segment_ids
            .iter()
            .map(|&id| Segment::open(&paths, id).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        // Step 3: Rebuild the active memtable
        let memtable_options = MemTableOptions {
            thresholds: config.thresholds(),
            sync_strategy: config.sync_strategy,
        };
        let log_path = paths.log_path();
        let temp_log_path = paths.temp_log_path();
        if !config.use_temp_log && temp_log_path.exists() {
            tracing::warn!(
                path = %temp_log_path.display(),
                "replaying leftover temp log even though use_temp_log is disabled"
            );
            // Folds the temp log into the primary log and removes it
            MemTable::open(&log_path, Some(temp_log_path.as_path()), memtable_options)?.close()?;
        }
        let active = MemTable::open(
            &log_path,
            config.use_temp_log.then_some(temp_log_path.as_path()),
            memtable_options,
        )?;

        tracing::info!(
            prefix = %config.storage_prefix.display(),
            segments = segments.len(),
            keys = active.key_count(),
            log_bytes = active.size(),
            "engine opened"
        );

        let shared = Arc::new(EngineShared {
            paths,
            memtable_options,
            use_temp_log: config.use_temp_log,
            state: RwLock::new(EngineState {
                active: Arc::new(active),
                frozen: None,
                segments,
            }),
            next_segment_id: AtomicU64::new(discovery.max_id + 1),
        });

        // Step 4: Flush worker
        let worker = if config.background_flush {
            Some(FlushWorker::spawn(Arc::clone(&shared))?)
        } else {
            None
        };

        let engine = Self {
            config,
            shared,
            worker: Mutex::new(worker),
            transition_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        };

        // A replayed log may already be over the threshold
        let active = engine.shared.active();
        if active.is_full() {
            engine.transition(&active)?;
        }

        Ok(engine)
    }

    /// Open with a storage prefix (convenience method)
    ///
    /// Uses default config with the specified prefix
    pub fn open_path(prefix: &Path) -> Result<Self> {
        let config = Config::builder().storage_prefix(prefix).build();
        Self::open(config)
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. Active memtable (most recent writes)
    /// 2. Frozen memtable still being flushed
    /// 3. Segments (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;

        let (active, frozen, segments) = {
            let state = self.shared.state.read();
            (
                Arc::clone(&state.active),
                state.frozen.as_ref().map(|f| Arc::clone(&f.memtable)),
                state.segments.clone(),
            )
        };

        if let Some(value) = active.get(key) {
            return Ok(Some(value));
        }

        if let Some(value) = frozen.and_then(|memtable| memtable.get(key)) {
            return Ok(Some(value));
        }

        for segment in &segments {
            if let Some(value) = segment.lookup(key)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Set a key-value pair
    ///
    /// Steps:
    /// 1. Append to the active memtable (log first, then memory)
    /// 2. If that memtable is now full, freeze and flush it
    ///
    /// The write is durable once step 1 succeeds, so a failure in step 2 is
    /// only logged. The memtable stays active and the flush is retried by the
    /// next write or `flush()`, which report the error.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;

        loop {
            let active = self.shared.active();
            match active.set(key, value) {
                Ok(_) => {
                    if active.is_full() {
                        if let Err(err) = self.transition(&active) {
                            tracing::warn!(error = %err, "flush after write failed; will retry");
                        }
                    }
                    return Ok(());
                }
                // Lost a race with a transition; wait for it, then retry
                Err(EmberError::MemTableFrozen) => {
                    self.transition(&active)?;
                    self.ensure_open()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Flush the active memtable to a segment now and wait for it
    ///
    /// Does nothing to an empty memtable, but still waits for any flush in
    /// progress.
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;

        let active = self.shared.active();
        if !active.is_empty() {
            self.transition(&active)?;
        }

        let _transition = self.transition_lock.lock();
        self.drain_flushes()
    }

    /// Close the engine
    ///
    /// Stops the flush worker, finishes any pending flush and closes the active
    /// memtable's log. Every call after the first returns `Ok(())`; every other
    /// operation fails with `ShuttingDown`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _transition = self.transition_lock.lock();
        let mut result = Ok(());

        if let Some(worker) = self.worker.lock().take() {
            if let Some(err) = worker.shutdown() {
                tracing::warn!(error = %err, "retrying failed background flush during close");
            }
        }

        if let Err(err) = self.shared.flush_frozen() {
            tracing::error!(error = %err, "pending flush failed during close");
            result = Err(err);
        }

        if let Err(err) = self.shared.active().close() {
            tracing::error!(error = %err, "failed to close active memtable");
            if result.is_ok() {
                result = Err(err);
            }
        }

        tracing::info!(prefix = %self.config.storage_prefix.display(), "engine closed");
        result
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the storage prefix
    pub fn storage_prefix(&self) -> &Path {
        &self.config.storage_prefix
    }

    /// Bytes appended to the active memtable's log
    pub fn memtable_size(&self) -> u64 {
        self.shared.active().size()
    }

    /// Distinct keys in the active memtable
    pub fn memtable_key_count(&self) -> usize {
        self.shared.active().key_count()
    }

    /// Get the number of published segments
    pub fn segment_count(&self) -> usize {
        self.shared.state.read().segments.len()
    }

    /// Ids of published segments, newest first
    pub fn segment_ids(&self) -> Vec<u64> {
        self.shared.state.read().segments.iter().map(|s| s.id()).collect()
    }

    /// Whether a frozen memtable is waiting for its segment
    pub fn is_flushing(&self) -> bool {
        self.shared.state.read().frozen.is_some()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EmberError::ShuttingDown);
        }
        Ok(())
    }

    /// Freeze `full` and install its successor.
    ///
    /// No-op if `full` is no longer the active memtable (another caller got
    /// there first) or is empty. Fails with `ShuttingDown` once the engine is
    /// closed. Safe to call again after a failure part way through: the
    /// freeze is idempotent and `full` stays active (and readable) until its
    /// successor is installed.
    fn transition(&self, full: &Arc<MemTable>) -> Result<()> {
        let _transition = self.transition_lock.lock();

        if !Arc::ptr_eq(&self.shared.active(), full) {
            return Ok(());
        }
        self.ensure_open()?;
        // Nothing to write; a zero threshold keeps an empty table "full"
        if full.is_empty() && !full.is_frozen() {
            return Ok(());
        }

        self.drain_flushes()?;
        full.prepare_for_flush()?;

        let log_path = self.shared.paths.log_path();
        let log_moved = full.frozen_log_path().is_some_and(|p| p != log_path);

        if log_moved {
            // The log now sits at the temp path, so the successor can claim the
            // primary log right away and the segment is written afterwards.
            let successor = Arc::new(self.shared.open_successor()?);
            let segment_id = self.shared.next_segment_id.fetch_add(1, Ordering::SeqCst);
            {
                let mut state = self.shared.state.write();
                state.active = successor;
                state.frozen = Some(FrozenTable {
                    memtable: Arc::clone(full),
                    segment_id,
                });
            }
            tracing::debug!(segment_id, keys = full.key_count(), "memtable frozen, flush scheduled");
            self.dispatch_flush()
        } else {
            // The frozen log still occupies the primary path: write the
            // segment first, then retire the log and open the successor.
            // A discarded log means an earlier attempt already published the
            // segment and only the successor is missing.
            if !full.is_log_discarded() {
                let segment_id = self.shared.next_segment_id.fetch_add(1, Ordering::SeqCst);
                let segment =
                    SegmentWriter::new(&self.shared.paths, segment_id).write(full.snapshot())?;
                self.shared.state.write().segments.insert(0, Arc::new(segment));

                full.discard_log()?;
                tracing::info!(segment_id, keys = full.key_count(), "flushed memtable to segment");
            }

            let successor = Arc::new(self.shared.open_successor()?);
            self.shared.state.write().active = successor;
            Ok(())
        }
    }

    /// Hand the frozen memtable to the worker, or flush it inline
    fn dispatch_flush(&self) -> Result<()> {
        match self.worker.lock().as_ref() {
            Some(worker) => worker.submit(),
            None => self.shared.flush_frozen(),
        }
    }

    /// Wait for the worker, then retry any flush it left unfinished.
    /// Caller holds `transition_lock`.
    fn drain_flushes(&self) -> Result<()> {
        if let Some(worker) = self.worker.lock().as_ref() {
            if let Some(err) = worker.wait_idle() {
                tracing::warn!(error = %err, "retrying failed background flush");
            }
        }
        self.shared.flush_frozen()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            if let Err(err) = self.close() {
                tracing::error!(error = %err, "failed to close engine on drop");
            }
        }
    }
}
