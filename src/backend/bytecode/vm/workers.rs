//! `START_WORKER`: schedule a block as an independent run.
//!
//! The worker is registered on the join barrier before it is handed to the
//! pool, so a parent that finishes right after spawning can never let the
//! barrier reach zero early. The pending unit is released by a guard, which
//! also covers a worker that panics; the panic itself is recorded as a
//! failure like any other error.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error};

use super::types::{VmError, VmResult};
use super::Frame;
use crate::backend::bytecode::barrier::{PendingGuard, WorkerFailure};
use crate::backend::bytecode::opcodes::Opcode;
use crate::backend::thread_pool::global_worker_pool;

impl Frame<'_> {
    pub(super) fn op_start_worker(&mut self) -> VmResult<()> {
        let index = self.read_u8()?;
        let worker = self.block_constant(index, Opcode::StartWorker.mnemonic())?;

        let guard = self
            .barrier
            .as_ref()
            .map(|barrier| PendingGuard::register(barrier.clone()));
        let vm = self.vm.clone();

        debug!(target: "mpl::vm::worker", block = worker.name(), "start_worker");
        global_worker_pool().spawn_detached(move || {
            let barrier = guard.as_ref().map(|g| g.barrier().clone());
            let result = catch_unwind(AssertUnwindSafe(|| {
                vm.execute(worker.clone(), Vec::new(), barrier, 0)
            }))
            .unwrap_or_else(|payload| {
                Err(VmError::WorkerPanicked(panic_message(payload.as_ref())))
            });

            if let Err(err) = result {
                error!(target: "mpl::vm::worker", block = worker.name(), error = %err, "worker failed");
                if let Some(guard) = &guard {
                    guard.barrier().record_failure(WorkerFailure {
                        block: worker.name().to_string(),
                        error: err,
                    });
                }
            }
            // Recorded failures are visible before the barrier can reach zero
            drop(guard);
        });
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
