//! Bytecode VM Module
//!
//! A stack-based bytecode virtual machine. Programs are [`Block`]s: an
//! instruction stream, a constant pool and a local slot count. Blocks are
//! currently built by hand with [`BlockBuilder`]; no compiler stage exists.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      Block (immutable, Arc)                       │
//! │        code bytes · constants (incl. nested Blocks) · locals      │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │ run(block, barrier)
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           Vm / Frame                              │
//! │                                                                   │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────────┐  │
//! │  │ Value Stack │  │   Locals    │  │ Operation Table (static) │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────────┘  │
//! │                                                                   │
//! │  CALL_FUNCTION ──> nested Frame (same thread, fresh state)        │
//! │  CALL_BUILTIN  ──> BuiltinRegistry (print, sleep, ...)            │
//! │  START_WORKER  ──> WorkerPool ──> independent Frame               │
//! │                        │                                          │
//! │                        └── JoinBarrier (pending count, failures)  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`opcodes`]: Instruction set and encoding
//! - [`operations`]: Operator codes and the operation table
//! - [`block`]: Block structure, builder and disassembler
//! - [`builtins`]: Native functions callable from bytecode
//! - [`barrier`]: Join barrier for worker runs
//! - [`vm`]: Virtual machine execution engine
//!
//! # Example
//!
//! ```
//! use mpl::backend::bytecode::{BlockBuilder, Opcode, Operator, Vm};
//! use mpl::backend::models::Value;
//!
//! // 40 + 2
//! let mut builder = BlockBuilder::new("example");
//! builder.emit_const(40.0);
//! builder.emit_const(2.0);
//! builder.emit_operation(Operator::Add);
//! builder.emit(Opcode::Return);
//!
//! let block = builder.build_arc();
//! let result = Vm::new().run(&block, None).expect("execution failed");
//! assert_eq!(result, Some(Value::Number(42.0)));
//! ```

pub mod barrier;
pub mod block;
pub mod builtins;
pub mod opcodes;
pub mod operations;
pub mod vm;

use std::sync::Arc;

// Re-export main types
pub use barrier::{JoinBarrier, PendingGuard, WorkerFailure};
pub use block::{Block, BlockBuilder, JumpLabel};
pub use builtins::{
    BuiltinContext, BuiltinError, BuiltinFn, BuiltinRegistry, BuiltinResult, OutputSink,
};
pub use opcodes::Opcode;
pub use operations::{Arity, Operator, OPERATION_TABLE};
pub use vm::{ConfigError, IndexKind, Vm, VmConfig, VmError, VmResult};

use crate::backend::models::Value;

/// Run a block on a default VM (standard builtins, stdout, default limits)
pub fn run(block: &Arc<Block>, barrier: Option<&Arc<JoinBarrier>>) -> VmResult<Option<Value>> {
    Vm::new().run(block, barrier)
}
