//! Arbitrary-precision operators (`BIG_*`).
//!
//! Arithmetic and relational operators accept a pair of `BigInt`s or a pair
//! of `BigFloat`s; mixing the two is a type error. Modulo and the bitwise
//! operators are integer-only. `BIG_POWER` is not implemented and always fails.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use super::{mismatch, shift_amount, Operator};
use crate::backend::bytecode::vm::{VmError, VmResult};
use crate::backend::models::Value;

/// Largest result `BIG_LEFT_SHIFT` may produce, in bits (8 MiB of digits)
pub const MAX_SHIFT_RESULT_BITS: u64 = 1 << 26;

enum BigPair {
    Int(BigInt, BigInt),
    Float(BigDecimal, BigDecimal),
}

fn pair(op: Operator, a: Value, b: Value) -> VmResult<BigPair> {
    match (a, b) {
        (Value::BigInt(x), Value::BigInt(y)) => Ok(BigPair::Int(x, y)),
        (Value::BigFloat(x), Value::BigFloat(y)) => Ok(BigPair::Float(x, y)),
        (Value::BigInt(_), other) => Err(mismatch(op, "BigInt", &other)),
        (Value::BigFloat(_), other) => Err(mismatch(op, "BigFloat", &other)),
        (other, _) => Err(mismatch(op, "BigInt or BigFloat", &other)),
    }
}

fn ints(op: Operator, a: Value, b: Value) -> VmResult<(BigInt, BigInt)> {
    match (a, b) {
        (Value::BigInt(x), Value::BigInt(y)) => Ok((x, y)),
        (Value::BigInt(_), other) | (other, _) => Err(mismatch(op, "BigInt", &other)),
    }
}

fn int(op: Operator, a: Value) -> VmResult<BigInt> {
    match a {
        Value::BigInt(x) => Ok(x),
        other => Err(mismatch(op, "BigInt", &other)),
    }
}

// === Arithmetic ===

pub(super) fn add(a: Value, b: Value) -> VmResult<Value> {
    Ok(match pair(Operator::BigAdd, a, b)? {
        BigPair::Int(x, y) => Value::BigInt(x + y),
        BigPair::Float(x, y) => Value::BigFloat(x + y),
    })
}

pub(super) fn subtract(a: Value, b: Value) -> VmResult<Value> {
    Ok(match pair(Operator::BigSubtract, a, b)? {
        BigPair::Int(x, y) => Value::BigInt(x - y),
        BigPair::Float(x, y) => Value::BigFloat(x - y),
    })
}

pub(super) fn multiply(a: Value, b: Value) -> VmResult<Value> {
    Ok(match pair(Operator::BigMultiply, a, b)? {
        BigPair::Int(x, y) => Value::BigInt(x * y),
        BigPair::Float(x, y) => Value::BigFloat(x * y),
    })
}

/// Integer division truncates toward zero.
pub(super) fn divide(a: Value, b: Value) -> VmResult<Value> {
    match pair(Operator::BigDivide, a, b)? {
        BigPair::Int(_, y) if y.is_zero() => Err(VmError::DivisionByZero),
        BigPair::Float(_, y) if y.is_zero() => Err(VmError::DivisionByZero),
        BigPair::Int(x, y) => Ok(Value::BigInt(x / y)),
        BigPair::Float(x, y) => Ok(Value::BigFloat(x / y)),
    }
}

/// Euclidean modulus: the result is never negative.
pub(super) fn modulo(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::BigModulo, a, b)?;
    if y.is_zero() {
        return Err(VmError::DivisionByZero);
    }
    let mut r = &x % &y;
    if r.is_negative() {
        r += y.abs();
    }
    Ok(Value::BigInt(r))
}

pub(super) fn power(_a: Value, _b: Value) -> VmResult<Value> {
    Err(VmError::UnimplementedOperator(Operator::BigPower))
}

// === Equality and relations ===

fn compare(op: Operator, a: Value, b: Value) -> VmResult<std::cmp::Ordering> {
    Ok(match pair(op, a, b)? {
        BigPair::Int(x, y) => x.cmp(&y),
        BigPair::Float(x, y) => x.cmp(&y),
    })
}

pub(super) fn equal(a: Value, b: Value) -> VmResult<Value> {
    compare(Operator::BigEqual, a, b).map(|o| Value::Boolean(o.is_eq()))
}

pub(super) fn not_equal(a: Value, b: Value) -> VmResult<Value> {
    compare(Operator::BigNotEqual, a, b).map(|o| Value::Boolean(o.is_ne()))
}

pub(super) fn less_than(a: Value, b: Value) -> VmResult<Value> {
    compare(Operator::BigLessThan, a, b).map(|o| Value::Boolean(o.is_lt()))
}

pub(super) fn greater_than(a: Value, b: Value) -> VmResult<Value> {
    compare(Operator::BigGreaterThan, a, b).map(|o| Value::Boolean(o.is_gt()))
}

pub(super) fn less_equal(a: Value, b: Value) -> VmResult<Value> {
    compare(Operator::BigLessEqual, a, b).map(|o| Value::Boolean(o.is_le()))
}

pub(super) fn greater_equal(a: Value, b: Value) -> VmResult<Value> {
    compare(Operator::BigGreaterEqual, a, b).map(|o| Value::Boolean(o.is_ge()))
}

// === Bitwise (two's complement) ===

pub(super) fn and(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::BigAnd, a, b)?;
    Ok(Value::BigInt(x & y))
}

pub(super) fn or(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::BigOr, a, b)?;
    Ok(Value::BigInt(x | y))
}

pub(super) fn xor(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::BigXor, a, b)?;
    Ok(Value::BigInt(x ^ y))
}

pub(super) fn not(a: Value) -> VmResult<Value> {
    let x = int(Operator::BigNot, a)?;
    Ok(Value::BigInt(-x - BigInt::one()))
}

pub(super) fn left_shift(a: Value, b: Value) -> VmResult<Value> {
    let amount = shift_amount(Operator::BigLeftShift, &b)?;
    let x = int(Operator::BigLeftShift, a)?;
    if x.is_zero() {
        return Ok(Value::BigInt(x));
    }
    let bits = x.bits().saturating_add(amount);
    if bits > MAX_SHIFT_RESULT_BITS {
        return Err(VmError::BigIntTooLarge {
            operator: Operator::BigLeftShift,
            bits,
            limit: MAX_SHIFT_RESULT_BITS,
        });
    }
    Ok(Value::BigInt(x << amount))
}

/// Rounds toward negative infinity, like an arithmetic shift.
pub(super) fn right_shift(a: Value, b: Value) -> VmResult<Value> {
    let amount = shift_amount(Operator::BigRightShift, &b)?;
    let x = int(Operator::BigRightShift, a)?;
    Ok(Value::BigInt(x >> amount))
}
