//! Stack operations for the bytecode VM.
//!
//! Push/pop with overflow and underflow checks, plus the constant and local
//! slot instructions.

use smallvec::SmallVec;

use super::types::{IndexKind, VmError, VmResult};
use super::Frame;
use crate::backend::bytecode::opcodes::Opcode;
use crate::backend::models::Value;

/// Argument list for builtin and function calls
pub(super) type Args = SmallVec<[Value; 8]>;

impl Frame<'_> {
    // === Stack Operations ===

    #[inline]
    pub(super) fn push(&mut self, value: Value) -> VmResult<()> {
        if self.stack.len() >= self.vm.config.max_stack {
            return Err(VmError::StackOverflow {
                limit: self.vm.config.max_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    #[inline]
    pub(super) fn pop(&mut self, opcode: Opcode) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow { opcode })
    }

    /// Pop the top `n` values, returned in push order
    pub(super) fn pop_n(&mut self, n: usize, opcode: Opcode) -> VmResult<Args> {
        let len = self.stack.len();
        if n > len {
            return Err(VmError::StackUnderflow { opcode });
        }
        Ok(self.stack.drain(len - n..).collect())
    }

    // === Constants and Locals ===

    pub(super) fn op_push_const(&mut self) -> VmResult<()> {
        let index = self.read_u8()?;
        let value = self
            .block
            .get_constant(index)
            .cloned()
            .ok_or(VmError::IndexOutOfRange {
                kind: IndexKind::Constant,
                index: index as usize,
            })?;
        self.push(value)
    }

    pub(super) fn op_push_local(&mut self) -> VmResult<()> {
        let index = self.read_u8()? as usize;
        let value = self
            .locals
            .get(index)
            .cloned()
            .ok_or(VmError::IndexOutOfRange {
                kind: IndexKind::Local,
                index,
            })?;
        self.push(value)
    }

    pub(super) fn op_store_local(&mut self) -> VmResult<()> {
        let index = self.read_u8()? as usize;
        if index >= self.locals.len() {
            return Err(VmError::IndexOutOfRange {
                kind: IndexKind::Local,
                index,
            });
        }
        let value = self.pop(Opcode::StoreLocal)?;
        self.locals[index] = value;
        Ok(())
    }

    pub(super) fn op_pop(&mut self) -> VmResult<()> {
        self.pop(Opcode::Pop).map(drop)
    }
}
