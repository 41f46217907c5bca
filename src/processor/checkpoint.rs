//! Background compaction of the undo log.
//!
//! Each cycle first drops the log prefix that precedes the latest complete
//! `StartCheckpoint`/`EndCheckpoint` pair, then opens a new checkpoint and
//! closes it once every transaction active at its start has finished. Only
//! then is the region before that checkpoint safe to drop on the next cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, info};

use crate::undo_log::Record;

use super::engine::TransactionEngine;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to start checkpoint worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Checkpoint worker panicked")]
    WorkerPanicked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointReport {
    /// Records dropped from the front of the log.
    pub truncated: usize,
    /// Transactions the checkpoint had to wait for.
    pub waited_for: usize,
}

#[derive(Debug, Clone)]
pub struct Checkpointer {
    engine: Arc<TransactionEngine>,
}

impl Checkpointer {
    pub fn new(engine: Arc<TransactionEngine>) -> Self {
        Self { engine }
    }

    pub fn run_once(&self) -> CheckpointReport {
        let truncated = self.truncate();
        let waited_for = self.checkpoint();
        CheckpointReport {
            truncated,
            waited_for,
        }
    }

    pub fn truncate(&self) -> usize {
        let truncated = self.engine.state.write().undo_log.truncate_to_checkpoint();
        if truncated > 0 {
            debug!(truncated, "undo log truncated");
        }
        truncated
    }

    /// Writes a `StartCheckpoint`, waits for the transactions that were
    /// active at that moment, then writes the matching `EndCheckpoint`.
    pub fn checkpoint(&self) -> usize {
        let pending: HashSet<_> = {
            let mut state = self.engine.state.write();
            let pending = state.active.keys().copied().collect();
            state.undo_log.append(Record::StartCheckpoint);
            pending
        };
        self.engine.wait_for_completion(&pending);
        self.engine
            .state
            .write()
            .undo_log
            .append(Record::EndCheckpoint);
        pending.len()
    }

    /// Runs a cycle every `interval` on a dedicated thread until the returned
    /// handle is stopped.
    pub fn spawn(self, interval: Duration) -> Result<CheckpointHandle, CheckpointError> {
        let stop = Arc::new(StopSignal::default());
        let worker = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("undo-log-checkpointer".to_string())
                .spawn(move || {
                    info!(?interval, "checkpointer started");
                    while !stop.wait(interval) {
                        let report = self.run_once();
                        debug!(?report, "checkpoint cycle finished");
                    }
                    info!("checkpointer stopped");
                })?
        };
        Ok(CheckpointHandle { stop, worker })
    }
}

/// Owner of a running checkpointer thread.
#[derive(Debug)]
pub struct CheckpointHandle {
    stop: Arc<StopSignal>,
    worker: JoinHandle<()>,
}

impl CheckpointHandle {
    /// Asks the worker to stop and waits for it. A cycle already in progress
    /// runs to completion first.
    pub fn stop(self) -> Result<(), CheckpointError> {
        self.stop.raise();
        self.worker
            .join()
            .map_err(|_| CheckpointError::WorkerPanicked)
    }
}

/// One-shot stop flag that can also be slept on.
#[derive(Debug, Default)]
struct StopSignal {
    raised: Mutex<bool>,
    changed: Condvar,
}

impl StopSignal {
    fn raise(&self) {
        *self.raised.lock() = true;
        self.changed.notify_all();
    }

    /// Sleeps for `timeout` or until raised. Returns whether it was raised.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut raised = self.raised.lock();
        while !*raised {
            if self.changed.wait_until(&mut raised, deadline).timed_out() {
                break;
            }
        }
        *raised
    }
}
