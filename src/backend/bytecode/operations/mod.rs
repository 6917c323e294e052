//! Operation table for `CALL_OPERATION`
//!
//! Every operator is a pure function over one or two operands. The table is a
//! fixed, immutable array indexed by operator code, so the VM resolves both the
//! implementation and the arity of an operator with a single lookup.
//!
//! Two families exist:
//! - machine precision (`Number`, `MachineInt`, `Boolean`, `Text`)
//! - arbitrary precision (`BigInt`, `BigFloat`), the `BIG_*` operators

use std::fmt;

use crate::backend::bytecode::vm::{VmError, VmResult};
use crate::backend::models::Value;

mod big;
mod machine;

pub use big::MAX_SHIFT_RESULT_BITS;

/// Operator codes, as encoded after `CALL_OPERATION`
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add = 0,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Not,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    LeftShift,
    RightShift,
    BigAdd,
    BigSubtract,
    BigMultiply,
    BigDivide,
    BigModulo,
    BigPower,
    BigEqual,
    BigNotEqual,
    BigLessThan,
    BigGreaterThan,
    BigLessEqual,
    BigGreaterEqual,
    BigAnd,
    BigOr,
    BigXor,
    BigNot,
    BigLeftShift,
    BigRightShift,
    Concatenate,
}

/// Number of entries in the operation table
pub const OPERATOR_COUNT: usize = 40;

impl Operator {
    /// Decode an operator code
    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        OPERATION_TABLE.get(code as usize).map(|entry| entry.operator)
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Arity of this operator
    #[inline]
    pub fn arity(self) -> Arity {
        OPERATION_TABLE[self as usize].arity()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Modulo => "modulo",
            Self::Power => "power",
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::LessThan => "less_than",
            Self::GreaterThan => "greater_than",
            Self::LessEqual => "less_equal",
            Self::GreaterEqual => "greater_equal",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::BitwiseAnd => "bitwise_and",
            Self::BitwiseOr => "bitwise_or",
            Self::BitwiseXor => "bitwise_xor",
            Self::BitwiseNot => "bitwise_not",
            Self::LeftShift => "left_shift",
            Self::RightShift => "right_shift",
            Self::BigAdd => "big_add",
            Self::BigSubtract => "big_subtract",
            Self::BigMultiply => "big_multiply",
            Self::BigDivide => "big_divide",
            Self::BigModulo => "big_modulo",
            Self::BigPower => "big_power",
            Self::BigEqual => "big_equal",
            Self::BigNotEqual => "big_not_equal",
            Self::BigLessThan => "big_less_than",
            Self::BigGreaterThan => "big_greater_than",
            Self::BigLessEqual => "big_less_equal",
            Self::BigGreaterEqual => "big_greater_equal",
            Self::BigAnd => "big_and",
            Self::BigOr => "big_or",
            Self::BigXor => "big_xor",
            Self::BigNot => "big_not",
            Self::BigLeftShift => "big_left_shift",
            Self::BigRightShift => "big_right_shift",
            Self::Concatenate => "concatenate",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// How many operands an operator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Pops 1, pushes 1
    Unary,
    /// Pops right then left, pushes 1
    Binary,
}

impl Arity {
    #[inline]
    pub fn operand_count(self) -> usize {
        match self {
            Arity::Unary => 1,
            Arity::Binary => 2,
        }
    }
}

pub type UnaryFn = fn(Value) -> VmResult<Value>;
pub type BinaryFn = fn(Value, Value) -> VmResult<Value>;

/// Implementation of one operator, classified by arity
#[derive(Clone, Copy)]
pub enum OperationFn {
    Unary(UnaryFn),
    Binary(BinaryFn),
}

/// One row of the operation table
#[derive(Clone, Copy)]
pub struct OperationEntry {
    pub operator: Operator,
    pub func: OperationFn,
}

impl OperationEntry {
    const fn unary(operator: Operator, func: UnaryFn) -> Self {
        Self {
            operator,
            func: OperationFn::Unary(func),
        }
    }

    const fn binary(operator: Operator, func: BinaryFn) -> Self {
        Self {
            operator,
            func: OperationFn::Binary(func),
        }
    }

    #[inline]
    pub fn arity(&self) -> Arity {
        match self.func {
            OperationFn::Unary(_) => Arity::Unary,
            OperationFn::Binary(_) => Arity::Binary,
        }
    }
}

impl fmt::Debug for OperationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationEntry")
            .field("operator", &self.operator)
            .field("arity", &self.arity())
            .finish()
    }
}

/// The operation table, indexed by operator code
pub static OPERATION_TABLE: [OperationEntry; OPERATOR_COUNT] = [
    OperationEntry::binary(Operator::Add, machine::add),
    OperationEntry::binary(Operator::Subtract, machine::subtract),
    OperationEntry::binary(Operator::Multiply, machine::multiply),
    OperationEntry::binary(Operator::Divide, machine::divide),
    OperationEntry::binary(Operator::Modulo, machine::modulo),
    OperationEntry::binary(Operator::Power, machine::power),
    OperationEntry::binary(Operator::Equal, machine::equal),
    OperationEntry::binary(Operator::NotEqual, machine::not_equal),
    OperationEntry::binary(Operator::LessThan, machine::less_than),
    OperationEntry::binary(Operator::GreaterThan, machine::greater_than),
    OperationEntry::binary(Operator::LessEqual, machine::less_equal),
    OperationEntry::binary(Operator::GreaterEqual, machine::greater_equal),
    OperationEntry::binary(Operator::And, machine::and),
    OperationEntry::binary(Operator::Or, machine::or),
    OperationEntry::unary(Operator::Not, machine::not),
    OperationEntry::binary(Operator::BitwiseAnd, machine::bitwise_and),
    OperationEntry::binary(Operator::BitwiseOr, machine::bitwise_or),
    OperationEntry::binary(Operator::BitwiseXor, machine::bitwise_xor),
    OperationEntry::unary(Operator::BitwiseNot, machine::bitwise_not),
    OperationEntry::binary(Operator::LeftShift, machine::left_shift),
    OperationEntry::binary(Operator::RightShift, machine::right_shift),
    OperationEntry::binary(Operator::BigAdd, big::add),
    OperationEntry::binary(Operator::BigSubtract, big::subtract),
    OperationEntry::binary(Operator::BigMultiply, big::multiply),
    OperationEntry::binary(Operator::BigDivide, big::divide),
    OperationEntry::binary(Operator::BigModulo, big::modulo),
    OperationEntry::binary(Operator::BigPower, big::power),
    OperationEntry::binary(Operator::BigEqual, big::equal),
    OperationEntry::binary(Operator::BigNotEqual, big::not_equal),
    OperationEntry::binary(Operator::BigLessThan, big::less_than),
    OperationEntry::binary(Operator::BigGreaterThan, big::greater_than),
    OperationEntry::binary(Operator::BigLessEqual, big::less_equal),
    OperationEntry::binary(Operator::BigGreaterEqual, big::greater_equal),
    OperationEntry::binary(Operator::BigAnd, big::and),
    OperationEntry::binary(Operator::BigOr, big::or),
    OperationEntry::binary(Operator::BigXor, big::xor),
    OperationEntry::unary(Operator::BigNot, big::not),
    OperationEntry::binary(Operator::BigLeftShift, big::left_shift),
    OperationEntry::binary(Operator::BigRightShift, big::right_shift),
    OperationEntry::binary(Operator::Concatenate, machine::concatenate),
];

/// Resolve an operator code to its table entry
#[inline]
pub fn lookup(code: u8) -> VmResult<&'static OperationEntry> {
    OPERATION_TABLE
        .get(code as usize)
        .ok_or(VmError::UnknownOperator(code))
}

/// Apply a unary operator directly (host-side convenience)
pub fn apply_unary(operator: Operator, operand: Value) -> VmResult<Value> {
    match OPERATION_TABLE[operator as usize].func {
        OperationFn::Unary(f) => f(operand),
        OperationFn::Binary(_) => Err(VmError::TypeMismatch {
            expected: "binary operands",
            found: "single operand",
            site: operator.mnemonic(),
        }),
    }
}

/// Apply a binary operator directly (host-side convenience)
pub fn apply_binary(operator: Operator, left: Value, right: Value) -> VmResult<Value> {
    match OPERATION_TABLE[operator as usize].func {
        OperationFn::Binary(f) => f(left, right),
        OperationFn::Unary(_) => Err(VmError::TypeMismatch {
            expected: "single operand",
            found: "binary operands",
            site: operator.mnemonic(),
        }),
    }
}

#[inline]
pub(crate) fn mismatch(operator: Operator, expected: &'static str, found: &Value) -> VmError {
    VmError::TypeMismatch {
        expected,
        found: found.type_name(),
        site: operator.mnemonic(),
    }
}

/// Shift amounts are non-negative machine integers
pub(crate) fn shift_amount(operator: Operator, value: &Value) -> VmResult<u64> {
    match value {
        Value::MachineInt(n) if *n >= 0 => Ok(*n as u64),
        other => Err(mismatch(operator, "non-negative MachineInt", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_code() {
        for (code, entry) in OPERATION_TABLE.iter().enumerate() {
            assert_eq!(entry.operator.code() as usize, code, "{:?}", entry);
            assert_eq!(Operator::from_code(code as u8), Some(entry.operator));
        }
    }

    #[test]
    fn test_unknown_operator_code() {
        assert!(matches!(lookup(40), Err(VmError::UnknownOperator(40))));
        assert!(matches!(lookup(255), Err(VmError::UnknownOperator(255))));
        assert!(Operator::from_code(200).is_none());
    }

    #[test]
    fn test_arity_classification() {
        let unary = [Operator::Not, Operator::BitwiseNot, Operator::BigNot];
        for entry in OPERATION_TABLE.iter() {
            let expected = if unary.contains(&entry.operator) {
                Arity::Unary
            } else {
                Arity::Binary
            };
            assert_eq!(entry.arity(), expected, "{}", entry.operator);
        }
        assert_eq!(Arity::Binary.operand_count(), 2);
    }

    #[test]
    fn test_apply_rejects_wrong_arity() {
        assert!(apply_unary(Operator::Add, Value::Number(1.0)).is_err());
        assert!(apply_binary(Operator::Not, Value::Boolean(true), Value::Boolean(false)).is_err());
    }

    #[test]
    fn test_shift_amount_must_be_non_negative() {
        assert_eq!(shift_amount(Operator::LeftShift, &Value::MachineInt(3)).ok(), Some(3));
        assert!(shift_amount(Operator::LeftShift, &Value::MachineInt(-1)).is_err());
        assert!(shift_amount(Operator::LeftShift, &Value::Number(1.0)).is_err());
    }
}
