//! Bytecode Virtual Machine
//!
//! The VM executes a [`Block`] against a private operand stack and locals
//! array. Every `run` creates a fresh [`Frame`]; frames are never shared, so
//! a failing run cannot disturb a sibling running concurrently.
//!
//! This module is organized into submodules by functionality:
//! - `types`: Core type definitions (VmError, VmConfig, etc.)
//! - `stack`: Stack, constant and local operations
//! - `operators`: `CALL_OPERATION` dispatch through the operation table
//! - `control_flow`: Absolute jumps and conditional branches
//! - `calls`: Builtin and nested function calls
//! - `workers`: `START_WORKER` scheduling and join barrier accounting

use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::trace;

use super::barrier::JoinBarrier;
use super::block::Block;
use super::builtins::{BuiltinContext, BuiltinRegistry, OutputSink};
use super::opcodes::Opcode;
use crate::backend::models::Value;

// === Submodules ===

mod calls;
mod control_flow;
mod operators;
mod stack;
mod types;
mod workers;


// === Re-exports ===

pub use types::{ConfigError, IndexKind, VmConfig, VmError, VmResult};

// === Vm Struct ===

/// The bytecode execution engine
///
/// A `Vm` holds only immutable, shareable state (configuration, builtin
/// registry, output sink) and is cheap to clone. Worker runs receive a clone.
#[derive(Debug, Clone)]
pub struct Vm {
    config: VmConfig,
    builtins: Arc<BuiltinRegistry>,
    ctx: BuiltinContext,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    // === Constructors ===

    /// Create a VM with the default configuration and the standard builtins
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with custom configuration
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            builtins: BuiltinRegistry::standard(),
            ctx: BuiltinContext::default(),
        }
    }

    /// Use a custom builtin registry
    pub fn with_builtins(mut self, builtins: Arc<BuiltinRegistry>) -> Self {
        self.builtins = builtins;
        self
    }

    /// Redirect builtin output
    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.ctx = BuiltinContext::new(output);
        self
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn builtins(&self) -> &Arc<BuiltinRegistry> {
        &self.builtins
    }

    pub fn output(&self) -> &OutputSink {
        &self.ctx.output
    }

    // === Entry Points ===

    /// Run a block to completion
    ///
    /// Returns `None` if the block halted (or ran off its end) and the top of
    /// the stack if it returned. Workers started by the block, and by any
    /// function it calls, are registered on `barrier` when one is given.
    pub fn run(
        &self,
        block: &Arc<Block>,
        barrier: Option<&Arc<JoinBarrier>>,
    ) -> VmResult<Option<Value>> {
        self.execute(Arc::clone(block), Vec::new(), barrier.cloned(), 0)
    }

    /// Invoke a block as a function from the host
    ///
    /// Argument `i` is placed in local slot `i`, exactly as `CALL_FUNCTION`
    /// does.
    pub fn call(&self, block: &Arc<Block>, args: &[Value]) -> VmResult<Option<Value>> {
        self.execute(Arc::clone(block), args.to_vec(), None, 0)
    }

    pub(super) fn execute(
        &self,
        block: Arc<Block>,
        args: Vec<Value>,
        barrier: Option<Arc<JoinBarrier>>,
        depth: usize,
    ) -> VmResult<Option<Value>> {
        let mut frame = Frame::new(self, block, args, barrier, depth);
        loop {
            match frame.step()? {
                ControlFlow::Continue(()) => continue,
                ControlFlow::Break(result) => return Ok(result),
            }
        }
    }
}

// === Frame ===

/// Private runtime state of one execution of a block
pub(super) struct Frame<'vm> {
    pub(super) vm: &'vm Vm,

    /// The block being executed
    pub(super) block: Arc<Block>,

    /// Current instruction pointer
    pub(super) ip: usize,

    /// Operand stack
    pub(super) stack: Vec<Value>,

    /// Local slots, sized from the block's local count
    pub(super) locals: Vec<Value>,

    /// Barrier shared with the root caller, if any
    pub(super) barrier: Option<Arc<JoinBarrier>>,

    /// Number of enclosing CALL_FUNCTION runs
    pub(super) depth: usize,
}

impl<'vm> Frame<'vm> {
    fn new(
        vm: &'vm Vm,
        block: Arc<Block>,
        mut locals: Vec<Value>,
        barrier: Option<Arc<JoinBarrier>>,
        depth: usize,
    ) -> Self {
        let local_count = block.local_count() as usize;
        if locals.len() < local_count {
            locals.resize(local_count, Value::Nil);
        }
        Self {
            vm,
            block,
            ip: 0,
            stack: Vec::with_capacity(16),
            locals,
            barrier,
            depth,
        }
    }

    /// Execute a single instruction
    pub(super) fn step(&mut self) -> VmResult<ControlFlow<Option<Value>>> {
        // Running off the end behaves like HALT
        if self.ip >= self.block.len() {
            return Ok(ControlFlow::Break(None));
        }

        let opcode_byte = self.read_u8()?;
        let opcode = Opcode::from_byte(opcode_byte).ok_or(VmError::UnknownOpcode(opcode_byte))?;

        if self.vm.config.trace {
            let (disasm, _) = self.block.disassemble_instruction(self.ip - 1);
            trace!(
                target: "mpl::vm::step",
                block = self.block.name(),
                ip = self.ip - 1,
                mnemonic = %disasm,
                stack_depth = self.stack.len()
            );
        }

        match opcode {
            Opcode::Halt => return Ok(ControlFlow::Break(None)),
            Opcode::PushConst => self.op_push_const()?,
            Opcode::PushLocal => self.op_push_local()?,
            Opcode::StoreLocal => self.op_store_local()?,
            Opcode::Pop => self.op_pop()?,
            Opcode::CallOperation => self.op_call_operation()?,
            Opcode::CallBuiltin => self.op_call_builtin()?,
            Opcode::StartWorker => self.op_start_worker()?,
            Opcode::Jump => self.op_jump()?,
            Opcode::JumpIfFalse => self.op_jump_if(false, opcode)?,
            Opcode::JumpIfTrue => self.op_jump_if(true, opcode)?,
            Opcode::CallFunction => self.op_call_function()?,
            Opcode::Return => return Ok(ControlFlow::Break(self.stack.pop())),
        }

        Ok(ControlFlow::Continue(()))
    }

    // === Bytecode Reading Helpers ===

    #[inline]
    pub(super) fn read_u8(&mut self) -> VmResult<u8> {
        let byte = self
            .block
            .read_byte(self.ip)
            .ok_or(VmError::TruncatedInstruction { offset: self.ip })?;
        self.ip += 1;
        Ok(byte)
    }

    #[inline]
    pub(super) fn read_u32(&mut self) -> VmResult<u32> {
        let value = self
            .block
            .read_u32(self.ip)
            .ok_or(VmError::TruncatedInstruction { offset: self.ip })?;
        self.ip += 4;
        Ok(value)
    }

    /// Fetch a constant that must be a block reference
    pub(super) fn block_constant(&self, index: u8, site: &'static str) -> VmResult<Arc<Block>> {
        match self.block.get_constant(index) {
            Some(Value::Block(block_ref)) => block_ref.resolve().ok_or(VmError::DanglingBlock),
            Some(other) => Err(VmError::TypeMismatch {
                expected: "Block",
                found: other.type_name(),
                site,
            }),
            None => Err(VmError::IndexOutOfRange {
                kind: IndexKind::Constant,
                index: index as usize,
            }),
        }
    }
}
