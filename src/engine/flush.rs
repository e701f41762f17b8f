//! Flush Worker
//!
//! Background thread that writes frozen memtables to segments.
//!
//! The worker only receives "flush now" requests; what to flush is read from
//! the engine state, which holds at most one frozen memtable. Transitions wait
//! for the worker to go idle before freezing the next table.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use parking_lot::{Condvar, Mutex};

use crate::error::{EmberError, Result};

use super::EngineShared;

/// A request to flush the frozen memtable
struct FlushRequest;

#[derive(Default)]
struct TrackerState {
    /// Requests submitted but not yet finished
    pending: usize,
    /// Most recent failure, kept until someone waits on the worker
    last_error: Option<String>,
}

#[derive(Default)]
struct FlushTracker {
    state: Mutex<TrackerState>,
    idle: Condvar,
}

impl FlushTracker {
    fn begin(&self) {
        self.state.lock().pending += 1;
    }

    fn finish(&self, outcome: Result<()>) {
        let mut state = self.state.lock();
        state.pending -= 1;
        if let Err(err) = outcome {
            tracing::error!(error = %err, "background flush failed");
            state.last_error = Some(err.to_string());
        }
        if state.pending == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) -> Option<String> {
        let mut state = self.state.lock();
        while state.pending > 0 {
            self.idle.wait(&mut state);
        }
        state.last_error.take()
    }
}

/// Owns the flush thread and its request channel
pub(crate) struct FlushWorker {
    sender: Option<Sender<FlushRequest>>,
    handle: Option<JoinHandle<()>>,
    tracker: Arc<FlushTracker>,
}

impl FlushWorker {
    pub(crate) fn spawn(shared: Arc<EngineShared>) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<FlushRequest>();
        let tracker = Arc::new(FlushTracker::default());
        let worker_tracker = Arc::clone(&tracker);

        let handle = thread::Builder::new()
            .name("emberkv-flush".to_string())
            .spawn(move || {
                for _request in receiver.iter() {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| shared.flush_frozen()))
                        .unwrap_or_else(|_| Err(EmberError::Flush("flush panicked".to_string())));
                    worker_tracker.finish(outcome);
                }
                tracing::debug!("flush worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            tracker,
        })
    }

    /// Ask the worker to flush the current frozen memtable
    pub(crate) fn submit(&self) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(EmberError::ShuttingDown)?;
        self.tracker.begin();
        if sender.send(FlushRequest).is_err() {
            self.tracker.finish(Ok(()));
            return Err(EmberError::ShuttingDown);
        }
        Ok(())
    }

    /// Block until every submitted flush has finished.
    ///
    /// Returns the last failure since the previous call, if any.
    pub(crate) fn wait_idle(&self) -> Option<String> {
        self.tracker.wait_idle()
    }

    /// Stop accepting requests, finish queued ones and join the thread
    pub(crate) fn shutdown(mut self) -> Option<String> {
        self.stop();
        self.tracker.wait_idle()
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("flush worker panicked");
            }
        }
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
