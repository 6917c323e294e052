//! Join barrier for worker runs
//!
//! A pending counter shared by a root caller and every worker it spawns
//! (transitively). Workers are registered before they are scheduled, so a
//! nested spawn is always counted before its parent can finish, and `wait`
//! cannot observe a spurious zero.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::vm::VmError;

/// A worker run that aborted with an error
#[derive(Debug, Clone)]
pub struct WorkerFailure {
    /// Name of the block the worker was running
    pub block: String,
    pub error: VmError,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker '{}' failed: {}", self.block, self.error)
    }
}

/// Counter-based barrier with a blocking wait
#[derive(Debug, Default)]
pub struct JoinBarrier {
    pending: Mutex<usize>,
    zero: Condvar,
    failures: Mutex<Vec<WorkerFailure>>,
}

impl JoinBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for the common shared case
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register `n` more pending units
    pub fn add(&self, n: usize) {
        *self.pending.lock() += n;
    }

    /// Mark one pending unit as finished
    pub fn done(&self) {
        let mut pending = self.pending.lock();
        debug_assert!(*pending > 0, "JoinBarrier::done called more often than add");
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.zero.notify_all();
        }
    }

    /// Number of units still pending
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Block until the pending count reaches zero
    pub fn wait(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.zero.wait(&mut pending);
        }
    }

    /// Block until the pending count reaches zero or the timeout elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while *pending > 0 {
            if self.zero.wait_until(&mut pending, deadline).timed_out() {
                return *pending == 0;
            }
        }
        true
    }

    /// Record a failed worker run
    pub fn record_failure(&self, failure: WorkerFailure) {
        self.failures.lock().push(failure);
    }

    /// Drain the failures recorded so far
    pub fn take_failures(&self) -> Vec<WorkerFailure> {
        std::mem::take(&mut *self.failures.lock())
    }
}

/// One registered pending unit, released on drop
///
/// Dropping the guard marks the unit done even if the worker panicked.
#[derive(Debug)]
pub struct PendingGuard {
    barrier: Arc<JoinBarrier>,
}

impl PendingGuard {
    /// Register one pending unit on `barrier`
    pub fn register(barrier: Arc<JoinBarrier>) -> Self {
        barrier.add(1);
        Self { barrier }
    }

    pub fn barrier(&self) -> &Arc<JoinBarrier> {
        &self.barrier
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.barrier.done();
    }
}
