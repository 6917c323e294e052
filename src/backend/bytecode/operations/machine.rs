//! Machine-precision operators.
//!
//! Arithmetic and relational operators work on `Number` (IEEE-754 doubles),
//! modulo and bitwise operators on `MachineInt`, boolean operators on
//! `Boolean` and concatenation on `Text`.

use super::{mismatch, shift_amount, Operator};
use crate::backend::bytecode::vm::{VmError, VmResult};
use crate::backend::models::Value;

#[inline]
fn numbers(op: Operator, a: Value, b: Value) -> VmResult<(f64, f64)> {
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => Ok((*x, *y)),
        (Value::Number(_), other) | (other, _) => Err(mismatch(op, "Number", other)),
    }
}

#[inline]
fn ints(op: Operator, a: Value, b: Value) -> VmResult<(i64, i64)> {
    match (&a, &b) {
        (Value::MachineInt(x), Value::MachineInt(y)) => Ok((*x, *y)),
        (Value::MachineInt(_), other) | (other, _) => Err(mismatch(op, "MachineInt", other)),
    }
}

#[inline]
fn bools(op: Operator, a: Value, b: Value) -> VmResult<(bool, bool)> {
    match (&a, &b) {
        (Value::Boolean(x), Value::Boolean(y)) => Ok((*x, *y)),
        (Value::Boolean(_), other) | (other, _) => Err(mismatch(op, "Boolean", other)),
    }
}

// === Arithmetic ===

pub(super) fn add(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::Add, a, b)?;
    Ok(Value::Number(x + y))
}

pub(super) fn subtract(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::Subtract, a, b)?;
    Ok(Value::Number(x - y))
}

pub(super) fn multiply(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::Multiply, a, b)?;
    Ok(Value::Number(x * y))
}

/// Division by exact zero (either sign) is an error rather than Inf/NaN.
pub(super) fn divide(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::Divide, a, b)?;
    if y == 0.0 {
        return Err(VmError::DivisionByZero);
    }
    Ok(Value::Number(x / y))
}

/// Truncating remainder; the sign follows the dividend.
pub(super) fn modulo(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::Modulo, a, b)?;
    if y == 0 {
        return Err(VmError::DivisionByZero);
    }
    // i64::MIN % -1 is 0, not an overflow
    Ok(Value::MachineInt(x.wrapping_rem(y)))
}

pub(super) fn power(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::Power, a, b)?;
    Ok(Value::Number(x.powf(y)))
}

// === Equality and relations ===

fn structural_eq(op: Operator, a: &Value, b: &Value) -> VmResult<bool> {
    if !a.same_tag(b) {
        return Err(mismatch(op, a.type_name(), b));
    }
    Ok(a == b)
}

pub(super) fn equal(a: Value, b: Value) -> VmResult<Value> {
    structural_eq(Operator::Equal, &a, &b).map(Value::Boolean)
}

pub(super) fn not_equal(a: Value, b: Value) -> VmResult<Value> {
    structural_eq(Operator::NotEqual, &a, &b).map(|eq| Value::Boolean(!eq))
}

pub(super) fn less_than(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::LessThan, a, b)?;
    Ok(Value::Boolean(x < y))
}

pub(super) fn greater_than(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::GreaterThan, a, b)?;
    Ok(Value::Boolean(x > y))
}

pub(super) fn less_equal(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::LessEqual, a, b)?;
    Ok(Value::Boolean(x <= y))
}

pub(super) fn greater_equal(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = numbers(Operator::GreaterEqual, a, b)?;
    Ok(Value::Boolean(x >= y))
}

// === Boolean ===

pub(super) fn and(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = bools(Operator::And, a, b)?;
    Ok(Value::Boolean(x && y))
}

pub(super) fn or(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = bools(Operator::Or, a, b)?;
    Ok(Value::Boolean(x || y))
}

pub(super) fn not(a: Value) -> VmResult<Value> {
    match a {
        Value::Boolean(x) => Ok(Value::Boolean(!x)),
        other => Err(mismatch(Operator::Not, "Boolean", &other)),
    }
}

// === Bitwise ===

pub(super) fn bitwise_and(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::BitwiseAnd, a, b)?;
    Ok(Value::MachineInt(x & y))
}

pub(super) fn bitwise_or(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::BitwiseOr, a, b)?;
    Ok(Value::MachineInt(x | y))
}

pub(super) fn bitwise_xor(a: Value, b: Value) -> VmResult<Value> {
    let (x, y) = ints(Operator::BitwiseXor, a, b)?;
    Ok(Value::MachineInt(x ^ y))
}

pub(super) fn bitwise_not(a: Value) -> VmResult<Value> {
    match a {
        Value::MachineInt(x) => Ok(Value::MachineInt(!x)),
        other => Err(mismatch(Operator::BitwiseNot, "MachineInt", &other)),
    }
}

/// Shifting by the full width or more clears every bit.
pub(super) fn left_shift(a: Value, b: Value) -> VmResult<Value> {
    let amount = shift_amount(Operator::LeftShift, &b)?;
    let x = match a {
        Value::MachineInt(x) => x,
        other => return Err(mismatch(Operator::LeftShift, "MachineInt", &other)),
    };
    let shifted = if amount >= u64::from(i64::BITS) {
        0
    } else {
        x << amount
    };
    Ok(Value::MachineInt(shifted))
}

/// Arithmetic shift; past the full width only the sign remains.
pub(super) fn right_shift(a: Value, b: Value) -> VmResult<Value> {
    let amount = shift_amount(Operator::RightShift, &b)?;
    let x = match a {
        Value::MachineInt(x) => x,
        other => return Err(mismatch(Operator::RightShift, "MachineInt", &other)),
    };
    let shifted = if amount >= u64::from(i64::BITS) {
        if x < 0 {
            -1
        } else {
            0
        }
    } else {
        x >> amount
    };
    Ok(Value::MachineInt(shifted))
}

// === Text ===

pub(super) fn concatenate(a: Value, b: Value) -> VmResult<Value> {
    match (a, b) {
        (Value::Text(mut x), Value::Text(y)) => {
            x.push_str(&y);
            Ok(Value::Text(x))
        }
        (Value::Text(_), other) | (other, _) => {
            Err(mismatch(Operator::Concatenate, "Text", &other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    fn i(x: i64) -> Value {
        Value::MachineInt(x)
    }

    #[test]
    fn test_arithmetic_matches_ieee() {
        let cases = [(0.1, 0.2), (1e308, 1e308), (-3.5, 2.25), (7.0, -0.0)];
        for (x, y) in cases {
            assert_eq!(add(n(x), n(y)).ok(), Some(n(x + y)));
            assert_eq!(subtract(n(x), n(y)).ok(), Some(n(x - y)));
            assert_eq!(multiply(n(x), n(y)).ok(), Some(n(x * y)));
        }
        assert_eq!(divide(n(1.0), n(3.0)).ok(), Some(n(1.0 / 3.0)));
        assert_eq!(power(n(2.0), n(10.0)).ok(), Some(n(1024.0)));
    }

    #[test]
    fn test_divide_by_zero_is_error() {
        assert!(matches!(divide(n(1.0), n(0.0)), Err(VmError::DivisionByZero)));
        assert!(matches!(divide(n(1.0), n(-0.0)), Err(VmError::DivisionByZero)));
        assert!(matches!(modulo(i(1), i(0)), Err(VmError::DivisionByZero)));
    }

    #[test]
    fn test_modulo_truncates() {
        assert_eq!(modulo(i(7), i(3)).ok(), Some(i(1)));
        assert_eq!(modulo(i(-7), i(3)).ok(), Some(i(-1)));
        assert_eq!(modulo(i(7), i(-3)).ok(), Some(i(1)));
        assert_eq!(modulo(i(i64::MIN), i(-1)).ok(), Some(i(0)));
    }

    #[test]
    fn test_modulo_rejects_numbers() {
        let err = modulo(n(7.0), n(3.0)).unwrap_err();
        assert!(matches!(
            err,
            VmError::TypeMismatch { expected: "MachineInt", found: "Number", site: "modulo" }
        ));
    }

    #[test]
    fn test_equality_is_complementary_and_tag_strict() {
        let pairs = [
            (n(1.0), n(1.0)),
            (n(1.0), n(2.0)),
            (Value::text("a"), Value::text("a")),
            (Value::text("a"), Value::text("b")),
            (Value::Boolean(true), Value::Boolean(false)),
            (Value::Nil, Value::Nil),
            (i(3), i(3)),
        ];
        for (a, b) in pairs {
            let eq = equal(a.clone(), b.clone()).unwrap();
            let ne = not_equal(a, b).unwrap();
            assert_eq!(eq.as_bool().map(|x| !x), ne.as_bool());
        }

        assert!(matches!(equal(n(1.0), i(1)), Err(VmError::TypeMismatch { .. })));
        assert!(matches!(
            not_equal(Value::text("1"), n(1.0)),
            Err(VmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_relations() {
        assert_eq!(less_than(n(10.0), n(5.0)).ok(), Some(Value::Boolean(false)));
        assert_eq!(greater_than(n(10.0), n(5.0)).ok(), Some(Value::Boolean(true)));
        assert_eq!(less_equal(n(5.0), n(5.0)).ok(), Some(Value::Boolean(true)));
        assert_eq!(greater_equal(n(4.0), n(5.0)).ok(), Some(Value::Boolean(false)));
        assert!(less_than(Value::text("a"), n(1.0)).is_err());
    }

    #[test]
    fn test_boolean_ops() {
        let t = Value::Boolean(true);
        let f = Value::Boolean(false);
        assert_eq!(and(t.clone(), f.clone()).ok(), Some(f.clone()));
        assert_eq!(or(t.clone(), f.clone()).ok(), Some(t.clone()));
        assert_eq!(not(t.clone()).ok(), Some(f));
        assert!(not(n(0.0)).is_err());
    }

    #[test]
    fn test_bitwise_ops() {
        assert_eq!(bitwise_and(i(0b1100), i(0b1010)).ok(), Some(i(0b1000)));
        assert_eq!(bitwise_or(i(0b1100), i(0b1010)).ok(), Some(i(0b1110)));
        assert_eq!(bitwise_xor(i(0b1100), i(0b1010)).ok(), Some(i(0b0110)));
        assert_eq!(bitwise_not(i(0)).ok(), Some(i(-1)));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(left_shift(i(1), i(4)).ok(), Some(i(16)));
        assert_eq!(right_shift(i(-16), i(2)).ok(), Some(i(-4)));
        assert_eq!(left_shift(i(1), i(64)).ok(), Some(i(0)));
        assert_eq!(right_shift(i(-5), i(100)).ok(), Some(i(-1)));
        assert_eq!(right_shift(i(5), i(100)).ok(), Some(i(0)));
        assert!(left_shift(i(1), i(-1)).is_err());
    }

    #[test]
    fn test_concatenate() {
        assert_eq!(
            concatenate(Value::text("Hello, "), Value::text("World!")).ok(),
            Some(Value::text("Hello, World!"))
        );
        assert!(concatenate(Value::text("x"), n(1.0)).is_err());
    }
}
