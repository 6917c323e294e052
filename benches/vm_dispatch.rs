//! Benchmarks for the bytecode dispatch loop
//!
//! Measures instruction dispatch, operation-table calls and nested
//! CALL_FUNCTION frames. Output-producing programs write to a capture sink so
//! the terminal is not part of the measurement.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mpl::backend::bytecode::builtins::OutputSink;
use mpl::backend::bytecode::{Block, BlockBuilder, Opcode, Operator, Vm};
use mpl::backend::programs;
use mpl::Value;
use std::sync::Arc;
use std::time::Duration;

/// Sum 0..n into local 1 without printing
fn build_sum_loop(n: f64) -> Arc<Block> {
    let mut builder = BlockBuilder::new("sum");
    builder.set_local_count(2);
    builder.emit_const(0.0);
    builder.emit_u8(Opcode::StoreLocal, 0);
    builder.emit_const(0.0);
    builder.emit_u8(Opcode::StoreLocal, 1);

    let start = builder.current_offset();
    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(n);
    builder.emit_operation(Operator::LessThan);
    let exit = builder.emit_jump(Opcode::JumpIfFalse);

    builder.emit_u8(Opcode::PushLocal, 1);
    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_operation(Operator::Add);
    builder.emit_u8(Opcode::StoreLocal, 1);

    builder.emit_u8(Opcode::PushLocal, 0);
    builder.emit_const(1.0);
    builder.emit_operation(Operator::Add);
    builder.emit_u8(Opcode::StoreLocal, 0);
    builder.emit_jump_to(Opcode::Jump, start);

    builder.patch_jump(exit);
    builder.emit_u8(Opcode::PushLocal, 1);
    builder.emit(Opcode::Return);
    builder.build_arc()
}

/// ((1 op 1) op 1) ... `depth` times
fn build_operator_chain(op: Operator, depth: usize) -> Arc<Block> {
    let mut builder = BlockBuilder::new("chain");
    builder.emit_const(1.0);
    for _ in 0..depth {
        builder.emit_const(1.0);
        builder.emit_operation(op);
    }
    builder.emit(Opcode::Return);
    builder.build_arc()
}

fn bench_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("loop");
    group.measurement_time(Duration::from_secs(5));
    let vm = Vm::new();

    for n in [10u64, 100, 1000].iter() {
        let block = build_sum_loop(*n as f64);
        group.throughput(Throughput::Elements(*n));
        group.bench_with_input(BenchmarkId::new("sum", n), &block, |b, block| {
            b.iter(|| vm.run(black_box(block), None).expect("VM execution failed"))
        });
    }

    group.finish();
}

fn bench_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("operations");
    let vm = Vm::new();

    for op in [Operator::Add, Operator::Multiply, Operator::LessThan].iter() {
        // LessThan yields a boolean, so chain it only once
        let depth = if *op == Operator::LessThan { 1 } else { 100 };
        let block = build_operator_chain(*op, depth);
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(
            BenchmarkId::new(op.mnemonic(), depth),
            &block,
            |b, block| b.iter(|| vm.run(black_box(block), None).expect("VM execution failed")),
        );
    }

    group.finish();
}

fn bench_factorial(c: &mut Criterion) {
    let mut group = c.benchmark_group("factorial");
    let vm = Vm::new().with_output(OutputSink::capture());
    let fact = programs::factorial();

    for n in [5.0, 10.0, 20.0].iter() {
        group.bench_with_input(BenchmarkId::new("call_function", n), n, |b, n| {
            b.iter(|| {
                vm.call(black_box(&fact), &[Value::Number(*n)])
                    .expect("VM execution failed")
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_loop, bench_operations, bench_factorial);
criterion_main!(benches);
