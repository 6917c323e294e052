//! Demo programs
//!
//! Hand-assembled blocks exercising each part of the instruction set. The
//! `mpl` binary runs them by name; the integration tests run them against a
//! capturing output sink.

use std::sync::Arc;

use num_bigint::BigInt;

use crate::backend::bytecode::builtins::{PRINT, SLEEP};
use crate::backend::bytecode::{Block, BlockBuilder, Opcode, Operator};
use crate::backend::models::Value;

/// A named, buildable demo program
#[derive(Debug, Clone, Copy)]
pub struct Program {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Arc<Block>,
}

impl Program {
    pub fn build(&self) -> Arc<Block> {
        (self.build)()
    }
}

static PROGRAMS: &[Program] = &[
    Program {
        name: "hello",
        description: "print a greeting",
        build: hello_world,
    },
    Program {
        name: "sleep",
        description: "sleep one second, then print",
        build: sleep,
    },
    Program {
        name: "worker",
        description: "start a worker and add two numbers",
        build: operation_and_worker,
    },
    Program {
        name: "condition",
        description: "if 5 < 10 print one branch, else the other",
        build: condition,
    },
    Program {
        name: "loop",
        description: "print 0 through 4",
        build: counting_loop,
    },
    Program {
        name: "factorial",
        description: "recursive factorial of 10",
        build: factorial_of_ten,
    },
    Program {
        name: "parity",
        description: "mutually recursive is_even/is_odd of 7",
        build: parity_of_seven,
    },
    Program {
        name: "big",
        description: "2^64 squared without overflow",
        build: big_square,
    },
];

/// All demo programs, in run order
pub fn all() -> &'static [Program] {
    PROGRAMS
}

/// Look up a program by name
pub fn find(name: &str) -> Option<&'static Program> {
    PROGRAMS.iter().find(|p| p.name == name)
}

fn print_const(builder: &mut BlockBuilder, value: impl Into<Value>) {
    builder.emit_const(value);
    builder.emit_u8_u8(Opcode::CallBuiltin, PRINT, 1);
}

pub fn hello_world() -> Arc<Block> {
    let mut builder = BlockBuilder::new("hello");
    print_const(&mut builder, "Hello, World!");
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

pub fn sleep() -> Arc<Block> {
    let mut builder = BlockBuilder::new("sleep");
    builder.emit_const(1000i64);
    builder.emit_u8_u8(Opcode::CallBuiltin, SLEEP, 1);
    print_const(&mut builder, "Slept for 1 second!");
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

/// Starts a printing worker, then prints `10 + 20` itself
pub fn operation_and_worker() -> Arc<Block> {
    let mut worker = BlockBuilder::new("greeter");
    print_const(&mut worker, "Hello from worker!");
    worker.emit(Opcode::Halt);

    let mut builder = BlockBuilder::new("worker");
    let w = builder.add_block(worker.build_arc());
    builder.emit_u8(Opcode::StartWorker, w);
    builder.emit_const(10.0);
    builder.emit_const(20.0);
    builder.emit_operation(Operator::Add);
    builder.emit_u8_u8(Opcode::CallBuiltin, PRINT, 1);
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

/// x = 5; if x < 10 { print "x < 10" } else { print "x >= 10" }
pub fn condition() -> Arc<Block> {
    condition_with(5.0)
}

pub fn condition_with(x: f64) -> Arc<Block> {
    let mut builder = BlockBuilder::new("condition");
    builder.set_local_count(1);
    builder.emit_const(x);
    builder.emit_u8(Opcode::StoreLocal, 0);

    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(10.0);
    builder.emit_operation(Operator::LessThan);
    let else_branch = builder.emit_jump(Opcode::JumpIfFalse);

    print_const(&mut builder, "x < 10");
    let end = builder.emit_jump(Opcode::Jump);

    builder.patch_jump(else_branch);
    print_const(&mut builder, "x >= 10");

    builder.patch_jump(end);
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

/// for i = 0; i < 5; i += 1 { print i }
pub fn counting_loop() -> Arc<Block> {
    let mut builder = BlockBuilder::new("loop");
    builder.set_local_count(1);
    builder.emit_const(0.0);
    builder.emit_u8(Opcode::StoreLocal, 0);

    let start = builder.current_offset();
    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(5.0);
    builder.emit_operation(Operator::LessThan);
    let exit = builder.emit_jump(Opcode::JumpIfFalse);

    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_u8_u8(Opcode::CallBuiltin, PRINT, 1);

    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(1.0);
    builder.emit_operation(Operator::Add);
    builder.emit_u8(Opcode::StoreLocal, 0);
    builder.emit_jump_to(Opcode::Jump, start);

    builder.patch_jump(exit);
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

/// factorial(n) = n < 2 ? 1 : n * factorial(n - 1)
pub fn factorial() -> Arc<Block> {
    let mut builder = BlockBuilder::new("factorial");
    builder.set_local_count(1);
    let me = builder.add_self_reference();

    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(2.0);
    builder.emit_operation(Operator::LessThan);
    let recurse = builder.emit_jump(Opcode::JumpIfFalse);
    builder.emit_const(1.0);
    builder.emit(Opcode::Return);

    builder.patch_jump(recurse);
    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(1.0);
    builder.emit_operation(Operator::Subtract);
    builder.emit_u8_u8(Opcode::CallFunction, me, 1);
    builder.emit_operation(Operator::Multiply);
    builder.emit(Opcode::Return);
    builder.build_arc()
}

fn factorial_of_ten() -> Arc<Block> {
    let mut builder = BlockBuilder::new("factorial_main");
    let f = builder.add_block(factorial());
    builder.emit_const(10.0);
    builder.emit_u8_u8(Opcode::CallFunction, f, 1);
    builder.emit_u8_u8(Opcode::CallBuiltin, PRINT, 1);
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

/// One half of the parity pair: `n == 0 ? at_zero : other(n - 1)`
fn parity_step(builder: &mut BlockBuilder, other: u8, at_zero: bool) {
    builder.set_local_count(1);
    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(0.0);
    builder.emit_operation(Operator::Equal);
    let recurse = builder.emit_jump(Opcode::JumpIfFalse);
    builder.emit_const(at_zero);
    builder.emit(Opcode::Return);

    builder.patch_jump(recurse);
    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(1.0);
    builder.emit_operation(Operator::Subtract);
    builder.emit_u8_u8(Opcode::CallFunction, other, 1);
    builder.emit(Opcode::Return);
}

/// is_even(n) = n == 0 || is_odd(n - 1), with is_odd calling back into it
pub fn is_even() -> Arc<Block> {
    let mut even = BlockBuilder::new("is_even");
    let odd_slot = even.add_deferred_block();
    parity_step(&mut even, odd_slot, true);

    even.build_cyclic(|even_weak| {
        let mut odd = BlockBuilder::new("is_odd");
        let back = odd.add_weak_block(even_weak);
        parity_step(&mut odd, back, false);
        vec![odd.build_arc()]
    })
}

fn parity_of_seven() -> Arc<Block> {
    let mut builder = BlockBuilder::new("parity_main");
    let f = builder.add_block(is_even());
    builder.emit_const(7.0);
    builder.emit_u8_u8(Opcode::CallFunction, f, 1);
    builder.emit_u8_u8(Opcode::CallBuiltin, PRINT, 1);
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

fn big_square() -> Arc<Block> {
    let two_64 = BigInt::from(1u32) << 64u32;
    let mut builder = BlockBuilder::new("big");
    builder.emit_const(two_64.clone());
    builder.emit_const(two_64);
    builder.emit_operation(Operator::BigMultiply);
    builder.emit_u8_u8(Opcode::CallBuiltin, PRINT, 1);
    builder.emit(Opcode::Halt);
    builder.build_arc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_names_are_unique() {
        for (i, a) in all().iter().enumerate() {
            for b in &all()[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
        assert!(find("loop").is_some());
        assert!(find("nope").is_none());
    }

    #[test]
    fn test_condition_layout() {
        // JUMP_IF_FALSE at 10 targets the else branch at 25; JUMP at 20 targets 30
        let block = condition();
        assert_eq!(block.read_opcode(10), Some(Opcode::JumpIfFalse));
        assert_eq!(block.read_u32(11), Some(25));
        assert_eq!(block.read_opcode(20), Some(Opcode::Jump));
        assert_eq!(block.read_u32(21), Some(30));
        assert_eq!(block.read_opcode(30), Some(Opcode::Halt));
    }

    #[test]
    fn test_loop_layout() {
        let block = counting_loop();
        assert_eq!(block.len(), 34);
        assert_eq!(block.read_u32(11), Some(33));
        assert_eq!(block.read_u32(29), Some(4));
    }

    #[test]
    fn test_every_program_disassembles() {
        for program in all() {
            let text = program.build().disassemble();
            assert!(text.contains(program.name), "{}", program.name);
            assert!(!text.contains("???"), "{}", text);
        }
    }
}
