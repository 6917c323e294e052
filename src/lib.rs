/// MPL - Bytecode Virtual Machine Library
///
/// This library provides a stack-based bytecode virtual machine for an
/// experimental scripting language. Programs are immutable blocks of bytecode
/// with a constant pool; the VM interprets them with a private operand stack
/// and locals array per run.
///
/// # Architecture
///
/// 1. **Values** (`backend::models`)
///    - Closed tagged union: numbers, machine and big integers, big floats,
///      text, booleans, block references, nil
///    - No implicit coercion; a wrong tag is a typed error
///
/// 2. **Bytecode** (`backend::bytecode`)
///    - Thirteen opcodes with one-byte indices and four-byte absolute jumps
///    - A static operation table of forty operators
///    - Builtins (`print`, `sleep`) behind an extensible registry
///    - Nested function calls and concurrent worker runs joined by a barrier
///
/// # Example
///
/// ```rust
/// use mpl::backend::bytecode::builtins::PRINT;
/// use mpl::backend::bytecode::{BlockBuilder, JoinBarrier, Opcode, OutputSink, Vm};
///
/// let mut worker = BlockBuilder::new("worker");
/// worker.emit_const("Hello from worker!");
/// worker.emit_u8_u8(Opcode::CallBuiltin, PRINT, 1);
/// worker.emit(Opcode::Halt);
///
/// let mut main = BlockBuilder::new("main");
/// let w = main.add_block(worker.build_arc());
/// main.emit_u8(Opcode::StartWorker, w);
/// main.emit(Opcode::Halt);
///
/// let output = OutputSink::capture();
/// let vm = Vm::new().with_output(output.clone());
/// let barrier = JoinBarrier::shared();
/// vm.run(&main.build_arc(), Some(&barrier)).unwrap();
/// barrier.wait();
///
/// assert_eq!(output.lines(), vec!["Hello from worker!"]);
/// ```
///
/// # Concurrency
///
/// - **Blocks** are immutable and shared across threads behind `Arc`
/// - **Frames** are private to one run and never shared
/// - **Workers** run on an elastic pool; `sleep` blocks only its own run
/// - **Join Barrier** is the only mutable state crossing runs
pub mod backend;

pub use backend::bytecode::{
    run, Block, BlockBuilder, JoinBarrier, Opcode, Operator, Vm, VmConfig, VmError, VmResult,
};
pub use backend::models::Value;
