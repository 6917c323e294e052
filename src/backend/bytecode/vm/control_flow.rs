//! Control flow operations for the bytecode VM.
//!
//! Jump targets are absolute offsets into the current block and must lie in
//! `[0, len)`.

use super::types::{IndexKind, VmError, VmResult};
use super::Frame;
use crate::backend::bytecode::opcodes::Opcode;
use crate::backend::models::Value;

impl Frame<'_> {
    /// Read a jump operand and check it against the block bounds
    fn read_target(&mut self) -> VmResult<usize> {
        let target = self.read_u32()? as usize;
        if target >= self.block.len() {
            return Err(VmError::IndexOutOfRange {
                kind: IndexKind::Jump,
                index: target,
            });
        }
        Ok(target)
    }

    pub(super) fn op_jump(&mut self) -> VmResult<()> {
        self.ip = self.read_target()?;
        Ok(())
    }

    /// `JUMP_IF_FALSE` / `JUMP_IF_TRUE`: the condition is popped whether or
    /// not the branch is taken.
    pub(super) fn op_jump_if(&mut self, when: bool, opcode: Opcode) -> VmResult<()> {
        let target = self.read_target()?;
        match self.pop(opcode)? {
            Value::Boolean(cond) => {
                if cond == when {
                    self.ip = target;
                }
                Ok(())
            }
            other => Err(VmError::TypeMismatch {
                expected: "Boolean",
                found: other.type_name(),
                site: opcode.mnemonic(),
            }),
        }
    }
}
