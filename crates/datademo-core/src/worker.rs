//! Shift execution wrapper.
//!
//! Runs a [`DateShifter`] inside one unit of work, restores suspended
//! listeners on every exit path, and refuses to start while another shift
//! is running in this process. [`ShiftWorker::schedule`] does the same on a
//! background thread, opening its own store there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::{Context, anyhow};
use tracing::{error, info, warn};

use crate::error::{CoreError, Result};
use crate::listeners::ListenerSuspension;
use crate::session::{
    DocumentStore, ListenerRegistry, ProgressSink, TransactionManager, TypeRegistry,
};
use crate::shift::{DONE_STATUS, DateShifter, RUNNING_STATUS, ShiftReport};

static RUNNING: AtomicBool = AtomicBool::new(false);

/// Process-wide "a shift is running" flag, cleared on drop.
#[derive(Debug)]
struct RunGuard(());

impl RunGuard {
    fn acquire() -> Result<Self> {
        RUNNING
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(()))
            .map_err(|_| CoreError::AlreadyRunning)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUNNING.store(false, Ordering::Release);
    }
}

/// Whether a shift is running in this process.
#[must_use]
pub fn is_running() -> bool {
    RUNNING.load(Ordering::Acquire)
}

/// Shared, cloneable status history.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    statuses: Arc<Mutex<Vec<String>>>,
}

impl StatusBoard {
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for StatusBoard {
    fn set_status(&self, status: &str) {
        info!(status, "shift status");
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status.to_string());
    }
}

/// Run `shifter` in one outer unit of work on the calling thread.
///
/// On failure the open unit of work is rolled back first, then suspended
/// listeners are restored, so restored flags persist even when the batch
/// does not.
///
/// # Errors
///
/// Returns [`CoreError::AlreadyRunning`] when another shift is active in
/// this process, or the shift's own failure.
pub fn run_foreground<S, T>(store: &S, types: &T, shifter: &mut DateShifter) -> Result<ShiftReport>
where
    S: DocumentStore + TransactionManager + ListenerRegistry,
    T: TypeRegistry + ?Sized,
{
    let _guard = RunGuard::acquire()?;
    run_guarded(store, types, shifter)
}

fn run_guarded<S, T>(store: &S, types: &T, shifter: &mut DateShifter) -> Result<ShiftReport>
where
    S: DocumentStore + TransactionManager + ListenerRegistry,
    T: TypeRegistry + ?Sized,
{
    store.start()?;
    let mut suspension = ListenerSuspension::new(store);
    match shifter.run_with(store, types, &mut suspension) {
        Ok(report) => {
            store.commit_or_rollback()?;
            Ok(report)
        }
        Err(err) => {
            error!(error = %err, "shift failed");
            if let Err(rollback_err) = store.rollback() {
                warn!(error = %rollback_err, "rollback after failed shift failed");
            }
            if suspension.is_suspended() {
                if let Err(restore_err) = suspension.restore() {
                    warn!(error = %restore_err, "could not restore listeners after failed shift");
                }
            }
            Err(err)
        }
    }
}

/// Handle on a scheduled shift.
#[derive(Debug)]
pub struct ShiftHandle {
    handle: JoinHandle<anyhow::Result<ShiftReport>>,
    status: StatusBoard,
}

impl ShiftHandle {
    #[must_use]
    pub const fn status(&self) -> &StatusBoard {
        &self.status
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the shift to finish.
    ///
    /// # Errors
    ///
    /// Returns the shift's failure, or an error if the worker panicked.
    pub fn join(self) -> anyhow::Result<ShiftReport> {
        self.handle
            .join()
            .map_err(|_| anyhow!("shift worker panicked"))?
    }
}

/// Background scheduler for date shifts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftWorker;

impl ShiftWorker {
    /// Start `shifter` on a new thread. `open` runs on that thread and
    /// provides the store the shift runs against.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::AlreadyRunning`] (downcastable) when a shift
    /// is active in this process, or when the thread cannot be spawned.
    pub fn schedule<F, S, T>(open: F, types: T, shifter: DateShifter) -> anyhow::Result<ShiftHandle>
    where
        F: FnOnce() -> anyhow::Result<S> + Send + 'static,
        S: DocumentStore + TransactionManager + ListenerRegistry + 'static,
        T: TypeRegistry + Send + 'static,
    {
        let guard = RunGuard::acquire()?;
        let status = StatusBoard::default();
        let mut shifter = shifter.with_progress(Arc::new(status.clone()));
        let board = status.clone();

        let handle = thread::Builder::new()
            .name("datademo-shift".to_string())
            .spawn(move || {
                let _guard = guard;
                board.set_status(RUNNING_STATUS);
                let store = open().context("open store for background shift")?;
                let report = run_guarded(&store, &types, &mut shifter)?;
                if report.rejected {
                    board.set_status(DONE_STATUS);
                }
                Ok(report)
            })
            .context("spawn shift worker")?;

        Ok(ShiftHandle { handle, status })
    }
}
