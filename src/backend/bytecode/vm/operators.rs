//! `CALL_OPERATION` dispatch.
//!
//! The operator code selects an entry of the operation table; the entry's
//! arity decides how many operands are popped. The right operand is popped
//! first.

use tracing::trace;

use super::types::VmResult;
use super::Frame;
use crate::backend::bytecode::opcodes::Opcode;
use crate::backend::bytecode::operations::{self, OperationFn};

impl Frame<'_> {
    pub(super) fn op_call_operation(&mut self) -> VmResult<()> {
        let code = self.read_u8()?;
        let entry = operations::lookup(code)?;

        let result = match entry.func {
            OperationFn::Unary(f) => {
                let operand = self.pop(Opcode::CallOperation)?;
                f(operand)?
            }
            OperationFn::Binary(f) => {
                let right = self.pop(Opcode::CallOperation)?;
                let left = self.pop(Opcode::CallOperation)?;
                f(left, right)?
            }
        };

        if self.vm.config.trace {
            trace!(target: "mpl::vm::step", op = %entry.operator, result = %result);
        }
        self.push(result)
    }
}
