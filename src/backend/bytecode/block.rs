//! Bytecode block representation
//!
//! A Block is the unit of execution: an instruction stream, a constant pool
//! and the number of local slots it declares. Blocks are immutable after
//! construction and are shared across threads behind an `Arc`.

use std::sync::{Arc, Weak};

use super::opcodes::Opcode;
use super::operations::Operator;
use crate::backend::models::{BlockRef, Value};

/// An immutable unit of bytecode
#[derive(Debug)]
pub struct Block {
    /// The bytecode instructions
    code: Vec<u8>,

    /// Constant pool, indexed by a one-byte operand
    constants: Vec<Value>,

    /// Number of local slots needed
    local_count: u16,

    /// Name of this block (for debugging)
    name: String,
}

impl Block {
    /// Create a block from raw parts
    ///
    /// No validation is performed; the VM defends against malformed input
    /// at execution time.
    pub fn from_parts(
        name: impl Into<String>,
        code: Vec<u8>,
        constants: Vec<Value>,
        local_count: u16,
    ) -> Self {
        Self {
            code,
            constants,
            local_count,
            name: name.into(),
        }
    }

    /// Create a builder for constructing a block
    pub fn builder(name: impl Into<String>) -> BlockBuilder {
        BlockBuilder::new(name)
    }

    /// Get the bytecode instructions
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Get the length of the bytecode
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Read a byte at the given offset
    #[inline]
    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read an opcode at the given offset
    #[inline]
    pub fn read_opcode(&self, offset: usize) -> Option<Opcode> {
        self.read_byte(offset).and_then(Opcode::from_byte)
    }

    /// Read a little-endian u32 at the given offset
    #[inline]
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.code.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Get a constant by index
    #[inline]
    pub fn get_constant(&self, index: u8) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    /// Get all constants
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Get the number of local slots
    #[inline]
    pub fn local_count(&self) -> u16 {
        self.local_count
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Disassemble the block to a string
    pub fn disassemble(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("=== {} ===\n", self.name));
        output.push_str(&format!(
            "locals: {}, constants: {}\n",
            self.local_count,
            self.constants.len()
        ));

        let mut offset = 0;
        while offset < self.code.len() {
            let (disasm, next_offset) = self.disassemble_instruction(offset);
            output.push_str(&format!("{:04x} {}\n", offset, disasm));
            offset = next_offset;
        }

        output
    }

    /// Disassemble a single instruction, returns (string, next_offset)
    pub fn disassemble_instruction(&self, offset: usize) -> (String, usize) {
        let Some(opcode) = self.read_opcode(offset) else {
            let byte = self.read_byte(offset).unwrap_or(0);
            return (format!("??? (0x{:02x})", byte), offset + 1);
        };

        let mnemonic = opcode.mnemonic();
        let next_offset = offset + 1 + opcode.immediate_size();
        if next_offset > self.code.len() {
            return (format!("{} <truncated>", mnemonic), self.code.len());
        }

        let a = self.read_byte(offset + 1).unwrap_or(0);
        let b = self.read_byte(offset + 2).unwrap_or(0);
        let operand_str = match opcode {
            Opcode::Halt | Opcode::Pop | Opcode::Return => String::new(),
            Opcode::PushConst | Opcode::StartWorker => format!(" #{} ({})", a, self.constant_str(a)),
            Opcode::PushLocal | Opcode::StoreLocal => format!(" {}", a),
            Opcode::CallOperation => match Operator::from_code(a) {
                Some(op) => format!(" {}", op),
                None => format!(" ?{}", a),
            },
            Opcode::CallBuiltin => format!(" {} argc={}", a, b),
            Opcode::CallFunction => {
                format!(" #{} ({}) argc={}", a, self.constant_str(a), b)
            }
            Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue => {
                let target = self.read_u32(offset + 1).unwrap_or(0);
                format!(" -> {:04x}", target)
            }
        };

        (format!("{}{}", mnemonic, operand_str), next_offset)
    }

    fn constant_str(&self, index: u8) -> String {
        self.get_constant(index)
            .map(|c| match c {
                Value::Text(s) => format!("{:?}", s),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "???".to_string())
    }
}

/// Builder for constructing Blocks
#[derive(Debug)]
pub struct BlockBuilder {
    code: Vec<u8>,
    constants: Vec<Value>,
    /// Constant slots to fill with a weak reference to the finished block
    self_refs: Vec<u8>,
    /// Constant slots to fill with the blocks returned by `build_cyclic`
    deferred: Vec<u8>,
    name: String,
    local_count: u16,
}

impl BlockBuilder {
    /// Create a new block builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            code: Vec::with_capacity(64),
            constants: Vec::new(),
            self_refs: Vec::new(),
            deferred: Vec::new(),
            name: name.into(),
            local_count: 0,
        }
    }

    /// Set the number of local slots
    pub fn set_local_count(&mut self, count: u16) {
        self.local_count = count;
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current bytecode offset
    #[inline]
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a single opcode
    pub fn emit(&mut self, opcode: Opcode) {
        self.code.push(opcode.to_byte());
    }

    /// Emit an opcode with a 1-byte operand
    pub fn emit_u8(&mut self, opcode: Opcode, operand: u8) {
        self.code.push(opcode.to_byte());
        self.code.push(operand);
    }

    /// Emit an opcode with two 1-byte operands
    pub fn emit_u8_u8(&mut self, opcode: Opcode, first: u8, second: u8) {
        self.code.push(opcode.to_byte());
        self.code.push(first);
        self.code.push(second);
    }

    /// Emit raw bytes
    pub fn emit_raw(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// Emit `CALL_OPERATION op`
    pub fn emit_operation(&mut self, operator: Operator) {
        self.emit_u8(Opcode::CallOperation, operator.code());
    }

    /// Add a constant to the pool, returns its index
    ///
    /// Constants are not deduplicated: `0.0` and `-0.0` compare equal but
    /// print differently.
    pub fn add_constant(&mut self, value: impl Into<Value>) -> u8 {
        let index = self.constants.len();
        if index > u8::MAX as usize {
            panic!("Too many constants in block (max {})", u8::MAX as usize + 1);
        }
        self.constants.push(value.into());
        index as u8
    }

    /// Emit a constant load
    pub fn emit_const(&mut self, value: impl Into<Value>) -> u8 {
        let index = self.add_constant(value);
        self.emit_u8(Opcode::PushConst, index);
        index
    }

    /// Add a nested block to the pool, returns its index
    pub fn add_block(&mut self, block: Arc<Block>) -> u8 {
        self.add_constant(Value::block(block))
    }

    /// Reserve a constant slot that refers to the block being built
    ///
    /// The slot is filled by [`BlockBuilder::build_arc`]. A block produced by
    /// [`BlockBuilder::build`] has no shared allocation to point at, so its
    /// self references never resolve.
    pub fn add_self_reference(&mut self) -> u8 {
        let index = self.add_constant(Value::Nil);
        self.self_refs.push(index);
        index
    }

    /// Add a weak link to another block, returns its index
    ///
    /// Used for the back edge of a cycle: inside [`BlockBuilder::build_cyclic`]
    /// the enclosing block exists only as a `Weak`.
    pub fn add_weak_block(&mut self, block: &Weak<Block>) -> u8 {
        self.add_constant(Value::Block(BlockRef::weak(block.clone())))
    }

    /// Reserve a constant slot for a block created by
    /// [`BlockBuilder::build_cyclic`]
    ///
    /// Slots are filled in reservation order.
    pub fn add_deferred_block(&mut self) -> u8 {
        let index = self.add_constant(Value::Nil);
        self.deferred.push(index);
        index
    }

    /// Emit a forward jump, returns a label to patch later
    pub fn emit_jump(&mut self, opcode: Opcode) -> JumpLabel {
        debug_assert!(opcode.is_jump());
        let offset = self.code.len();
        self.code.push(opcode.to_byte());
        // Placeholder for the absolute target
        self.code.extend_from_slice(&[0xFF; 4]);
        JumpLabel { offset: offset + 1 }
    }

    /// Patch a jump label to jump to the current position
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = match u32::try_from(self.code.len()) {
            Ok(target) => target,
            Err(_) => panic!("Block too large to jump within (max {} bytes)", u32::MAX),
        };
        self.code[label.offset..label.offset + 4].copy_from_slice(&target.to_le_bytes());
    }

    /// Emit a jump to a known absolute offset
    pub fn emit_jump_to(&mut self, opcode: Opcode, target: usize) {
        debug_assert!(opcode.is_jump());
        let target = match u32::try_from(target) {
            Ok(target) => target,
            Err(_) => panic!("Jump target {} out of range (max {})", target, u32::MAX),
        };
        self.code.push(opcode.to_byte());
        self.code.extend_from_slice(&target.to_le_bytes());
    }

    /// Build the final block
    ///
    /// # Panics
    ///
    /// If a slot was reserved with [`BlockBuilder::add_deferred_block`].
    pub fn build(self) -> Block {
        if !self.deferred.is_empty() {
            panic!("Block '{}' has deferred block slots; use build_cyclic", self.name);
        }
        let mut constants = self.constants;
        for &index in &self.self_refs {
            constants[index as usize] = Value::Block(BlockRef::weak(Weak::new()));
        }
        Block {
            code: self.code,
            constants,
            local_count: self.local_count,
            name: self.name,
        }
    }

    /// Build and wrap in Arc, resolving self references
    pub fn build_arc(self) -> Arc<Block> {
        self.build_cyclic(|_| Vec::new())
    }

    /// Build a block that sits on a cycle of blocks
    ///
    /// `link` receives a weak handle to the block being built and returns the
    /// blocks for the slots reserved with
    /// [`BlockBuilder::add_deferred_block`], in order. Those blocks are held
    /// strongly; they refer back through [`BlockBuilder::add_weak_block`].
    ///
    /// ```
    /// use mpl::backend::bytecode::{BlockBuilder, Opcode};
    ///
    /// let mut ping = BlockBuilder::new("ping");
    /// let pong_slot = ping.add_deferred_block();
    /// ping.emit_u8_u8(Opcode::CallFunction, pong_slot, 0);
    /// let ping = ping.build_cyclic(|ping_weak| {
    ///     let mut pong = BlockBuilder::new("pong");
    ///     pong.add_weak_block(ping_weak);
    ///     pong.emit(Opcode::Halt);
    ///     vec![pong.build_arc()]
    /// });
    /// assert_eq!(ping.constants().len(), 1);
    /// ```
    ///
    /// # Panics
    ///
    /// If `link` returns a different number of blocks than were reserved.
    pub fn build_cyclic<F>(self, link: F) -> Arc<Block>
    where
        F: FnOnce(&Weak<Block>) -> Vec<Arc<Block>>,
    {
        let BlockBuilder {
            code,
            mut constants,
            self_refs,
            deferred,
            name,
            local_count,
        } = self;

        Arc::new_cyclic(|this: &Weak<Block>| {
            for &index in &self_refs {
                constants[index as usize] = Value::Block(BlockRef::weak(this.clone()));
            }
            let linked = link(this);
            if linked.len() != deferred.len() {
                panic!(
                    "Block '{}' reserved {} deferred slots but {} blocks were linked",
                    name,
                    deferred.len(),
                    linked.len()
                );
            }
            for (&index, block) in deferred.iter().zip(linked) {
                constants[index as usize] = Value::block(block);
            }
            Block {
                code,
                constants,
                local_count,
                name,
            }
        })
    }
}

/// Label for a forward jump to be patched later
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel {
    offset: usize,
}
