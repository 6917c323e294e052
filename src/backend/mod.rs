// Backend module for the MPL virtual machine
//
// - `models`: runtime values shared by every layer
// - `bytecode`: blocks, the operation table, builtins and the VM
// - `thread_pool`: elastic pool that runs worker blocks
// - `programs`: hand-built demo programs

pub mod bytecode;
pub mod models;
pub mod programs;
pub mod thread_pool;

pub use bytecode::{run, Block, BlockBuilder, JoinBarrier, Vm, VmConfig, VmError, VmResult};
pub use models::*;
