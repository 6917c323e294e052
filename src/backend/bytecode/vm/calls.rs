//! Call operations for the bytecode VM.
//!
//! - CallBuiltin: call a native function from the builtin registry
//! - CallFunction: run a nested block synchronously in a fresh frame

use tracing::trace;

use super::types::{IndexKind, VmError, VmResult};
use super::Frame;
use crate::backend::bytecode::opcodes::Opcode;

impl Frame<'_> {
    /// Stack: [arg1, ..., argN] -> [result?]
    pub(super) fn op_call_builtin(&mut self) -> VmResult<()> {
        let id = self.read_u8()?;
        let argc = self.read_u8()? as usize;

        if id as usize >= self.vm.builtins.len() {
            return Err(VmError::IndexOutOfRange {
                kind: IndexKind::Builtin,
                index: id as usize,
            });
        }
        let args = self.pop_n(argc, Opcode::CallBuiltin)?;

        trace!(
            target: "mpl::vm::call",
            builtin = self.vm.builtins.get_name(id).unwrap_or("?"),
            argc,
            "call_builtin"
        );
        if let Some(result) = self.vm.builtins.call(id, &args, &self.vm.ctx)? {
            self.push(result)?;
        }
        Ok(())
    }

    /// Stack: [arg1, ..., argN] -> [result?]
    ///
    /// The callee gets its own locals, pre-populated from the arguments, and
    /// its own stack. It shares this run's join barrier.
    pub(super) fn op_call_function(&mut self) -> VmResult<()> {
        let index = self.read_u8()?;
        let argc = self.read_u8()? as usize;

        let callee = self.block_constant(index, Opcode::CallFunction.mnemonic())?;
        let args = self.pop_n(argc, Opcode::CallFunction)?;

        let depth = self.depth + 1;
        if depth > self.vm.config.max_call_depth {
            return Err(VmError::CallDepthExceeded {
                limit: self.vm.config.max_call_depth,
            });
        }

        trace!(target: "mpl::vm::call", callee = callee.name(), argc, depth, "call_function");
        let result = self
            .vm
            .execute(callee, args.into_vec(), self.barrier.clone(), depth)?;

        if let Some(value) = result {
            self.push(value)?;
        }
        Ok(())
    }
}
