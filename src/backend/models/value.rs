use std::fmt;
use std::sync::{Arc, Weak};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::backend::bytecode::block::Block;

/// A runtime value flowing through the operand stack, locals and constant pools.
///
/// The tag decides which operators may consume a value; there is no implicit
/// coercion between tags.
#[derive(Debug, Clone)]
pub enum Value {
    /// Default numeric representation (arithmetic, comparisons, indices)
    Number(f64),
    /// Fixed-width integer for modulo and bitwise operators
    MachineInt(i64),
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// Arbitrary-precision decimal float
    BigFloat(BigDecimal),
    /// A string
    Text(String),
    /// A boolean
    Boolean(bool),
    /// Shared, read-only reference to a block (function or worker body)
    Block(BlockRef),
    /// Absence of a value
    Nil,
}

impl Value {
    /// Name of this value's tag, used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::MachineInt(_) => "MachineInt",
            Value::BigInt(_) => "BigInt",
            Value::BigFloat(_) => "BigFloat",
            Value::Text(_) => "Text",
            Value::Boolean(_) => "Boolean",
            Value::Block(_) => "Block",
            Value::Nil => "Nil",
        }
    }

    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Create a block reference value
    pub fn block(block: Arc<Block>) -> Self {
        Value::Block(BlockRef::new(block))
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_machine_int(&self) -> Option<i64> {
        match self {
            Value::MachineInt(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Check whether two values carry the same tag
    #[inline]
    pub fn same_tag(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Structural equality for same-tag values. Differing tags are never equal;
/// the VM reports those as type errors before reaching this impl.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::MachineInt(a), Value::MachineInt(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::BigFloat(a), Value::BigFloat(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Block(a), Value::Block(b)) => a.ptr_eq(b),
            (Value::Nil, Value::Nil) => true,
            _ => false,
        }
    }
}

/// Textual form written by `print`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::MachineInt(n) => write!(f, "{}", n),
            Value::BigInt(n) => write!(f, "{}", n),
            Value::BigFloat(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Block(b) => write!(f, "<block {}>", b.name()),
            Value::Nil => f.write_str("nil"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::MachineInt(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl From<BigDecimal> for Value {
    fn from(n: BigDecimal) -> Self {
        Value::BigFloat(n)
    }
}

impl From<Arc<Block>> for Value {
    fn from(block: Arc<Block>) -> Self {
        Value::block(block)
    }
}

/// Handle to a shared, immutable [`Block`].
///
/// Blocks referenced from another block's constant pool are held strongly.
/// A block that references itself, directly or through a cycle of nested
/// blocks, holds a weak link for the back edge so the cycle does not leak;
/// the link is resolved each time the constant is fetched.
#[derive(Clone)]
pub struct BlockRef {
    link: BlockLink,
}

#[derive(Clone)]
enum BlockLink {
    Strong(Arc<Block>),
    Weak(Weak<Block>),
}

impl BlockRef {
    pub fn new(block: Arc<Block>) -> Self {
        Self {
            link: BlockLink::Strong(block),
        }
    }

    /// A non-owning link, for back edges of a cycle of blocks
    pub fn weak(block: Weak<Block>) -> Self {
        Self {
            link: BlockLink::Weak(block),
        }
    }

    /// Get the referenced block, or `None` if a weak self-reference outlived it.
    pub fn resolve(&self) -> Option<Arc<Block>> {
        match &self.link {
            BlockLink::Strong(block) => Some(Arc::clone(block)),
            BlockLink::Weak(block) => block.upgrade(),
        }
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &BlockRef) -> bool {
        std::ptr::eq(self.as_ptr(), other.as_ptr())
    }

    /// Whether this is a weak back-reference
    pub fn is_weak(&self) -> bool {
        matches!(self.link, BlockLink::Weak(_))
    }

    fn as_ptr(&self) -> *const Block {
        match &self.link {
            BlockLink::Strong(block) => Arc::as_ptr(block),
            BlockLink::Weak(block) => block.as_ptr(),
        }
    }

    /// Name of the referenced block, `"<dropped>"` if it no longer exists.
    pub fn name(&self) -> String {
        self.resolve()
            .map(|b| b.name().to_string())
            .unwrap_or_else(|| "<dropped>".to_string())
    }
}

// Blocks may be cyclic through weak links, so only the name is printed.
impl fmt::Debug for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_weak() { "weak" } else { "strong" };
        write!(f, "BlockRef({}, {})", self.name(), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bytecode::block::BlockBuilder;
    use crate::backend::bytecode::opcodes::Opcode;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Number(1.0).type_name(), "Number");
        assert_eq!(Value::MachineInt(1).type_name(), "MachineInt");
        assert_eq!(Value::BigInt(BigInt::from(1)).type_name(), "BigInt");
        assert_eq!(Value::text("x").type_name(), "Text");
        assert_eq!(Value::Boolean(true).type_name(), "Boolean");
        assert_eq!(Value::Nil.type_name(), "Nil");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(0.0).to_string(), "0");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::MachineInt(-7).to_string(), "-7");
        assert_eq!(Value::text("Hello, World!").to_string(), "Hello, World!");
        assert_eq!(Value::Boolean(false).to_string(), "false");
        assert_eq!(Value::Nil.to_string(), "nil");
    }

    #[test]
    fn test_equality_is_tag_sensitive() {
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(1.0), Value::MachineInt(1));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert!(Value::Nil.same_tag(&Value::Nil));
        assert!(!Value::Nil.same_tag(&Value::Boolean(false)));
    }

    #[test]
    fn test_block_ref_identity() {
        let mut builder = BlockBuilder::new("a");
        builder.emit(Opcode::Halt);
        let a = builder.build_arc();
        let mut builder = BlockBuilder::new("a");
        builder.emit(Opcode::Halt);
        let b = builder.build_arc();

        assert_eq!(Value::block(Arc::clone(&a)), Value::block(Arc::clone(&a)));
        assert_ne!(Value::block(a), Value::block(b));
    }

    #[test]
    fn test_weak_ref_dangles_after_drop() {
        let mut builder = BlockBuilder::new("gone");
        builder.emit(Opcode::Halt);
        let block = builder.build_arc();
        let weak = BlockRef::weak(Arc::downgrade(&block));
        assert!(weak.resolve().is_some());
        drop(block);
        assert!(weak.resolve().is_none());
        assert_eq!(weak.name(), "<dropped>");
    }
}
