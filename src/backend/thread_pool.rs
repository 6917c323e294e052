//! Elastic worker pool for `START_WORKER`
//!
//! Worker runs are long-lived and may block (`sleep`), so a fixed-size pool
//! could let sleeping workers starve queued siblings. This pool keeps a core
//! of persistent threads and grows whenever a task arrives with no idle
//! thread to take it. Threads beyond the core retire after sitting idle.
//!
//! # Design
//!
//! ```text
//!  spawn_detached ──> Unbounded Channel ──> Worker 1 .. Worker N
//!        │                                       ▲
//!        └── no idle worker? ── spawn thread ────┘
//! ```
//!
//! `idle` counts waiting threads that no submitter has claimed yet. A
//! submitter either claims one of them or starts a new thread, so every
//! queued task has a thread that will pick it up without waiting on another
//! task to finish.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

/// How long a non-core thread waits for work before retiring
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Worker runs recurse through nested CALL_FUNCTION frames
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Global worker pool instance
static GLOBAL_POOL: LazyLock<WorkerPool> = LazyLock::new(|| WorkerPool::new(num_cpus::get()));

/// Get the global worker pool
pub fn global_worker_pool() -> &'static WorkerPool {
    &GLOBAL_POOL
}

/// A boxed task that can be sent across threads
type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct PoolState {
    /// Waiting threads not yet claimed by a submitter
    idle: AtomicUsize,
    /// Live threads
    threads: AtomicUsize,
    /// Monotonic id for thread names
    next_id: AtomicUsize,
}

impl PoolState {
    fn try_claim_idle(&self) -> bool {
        self.idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// A thread pool that never queues a task behind a busy thread
pub struct WorkerPool {
    sender: Sender<BoxedTask>,
    receiver: Receiver<BoxedTask>,
    state: Arc<PoolState>,
    core_threads: usize,
}

impl WorkerPool {
    /// Create a pool with `core_threads` persistent threads
    ///
    /// Core threads are spawned immediately and block on the channel.
    pub fn new(core_threads: usize) -> Self {
        let (sender, receiver) = unbounded::<BoxedTask>();
        let pool = Self {
            sender,
            receiver,
            state: Arc::new(PoolState::default()),
            core_threads,
        };

        for _ in 0..core_threads {
            pool.state.idle.fetch_add(1, Ordering::AcqRel);
            if !pool.start_thread(true) {
                pool.state.idle.fetch_sub(1, Ordering::AcqRel);
            }
        }

        pool
    }

    /// Number of persistent threads
    pub fn core_threads(&self) -> usize {
        self.core_threads
    }

    /// Number of live threads, core and elastic
    pub fn num_threads(&self) -> usize {
        self.state.threads.load(Ordering::Acquire)
    }

    /// Number of threads waiting for work
    pub fn idle_threads(&self) -> usize {
        self.state.idle.load(Ordering::Acquire)
    }

    /// Run a task on the pool without waiting for it (fire-and-forget)
    ///
    /// Never blocks on other tasks: if no thread is idle, a new one is
    /// started. A panicking task is logged and does not take its thread down.
    pub fn spawn_detached<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let claimed = self.state.try_claim_idle();

        // The pool owns a receiver, so the channel cannot be disconnected here.
        if self.sender.send(Box::new(f)).is_err() {
            error!(target: "mpl::pool", "worker channel closed, task dropped");
            return;
        }

        if !claimed {
            self.start_thread(false);
        }
    }

    fn start_thread(&self, core: bool) -> bool {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let receiver = self.receiver.clone();
        let state = Arc::clone(&self.state);

        self.state.threads.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("vm-worker-{}", id))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || worker_loop(receiver, state, core));

        match spawned {
            Ok(_) => {
                debug!(target: "mpl::pool", id, core, "started worker thread");
                true
            }
            Err(e) => {
                self.state.threads.fetch_sub(1, Ordering::AcqRel);
                // The task stays queued for the next thread that frees up.
                error!(target: "mpl::pool", error = %e, "failed to spawn worker thread");
                false
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("core_threads", &self.core_threads)
            .field("threads", &self.num_threads())
            .field("idle", &self.idle_threads())
            .finish()
    }
}

/// Worker thread main loop
fn worker_loop(receiver: Receiver<BoxedTask>, state: Arc<PoolState>, core: bool) {
    loop {
        let task = if core {
            match receiver.recv() {
                Ok(task) => task,
                Err(_) => break,
            }
        } else {
            match receiver.recv_timeout(KEEP_ALIVE) {
                Ok(task) => task,
                Err(RecvTimeoutError::Timeout) => {
                    // Retire only if no submitter has claimed this thread.
                    if state.try_claim_idle() {
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        };

        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!(target: "mpl::pool", "worker task panicked");
        }
        state.idle.fetch_add(1, Ordering::AcqRel);
    }
    state.threads.fetch_sub(1, Ordering::AcqRel);
}
