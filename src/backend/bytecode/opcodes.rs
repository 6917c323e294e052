//! Bytecode opcodes for the MPL VM
//!
//! Every instruction is a single opcode byte followed by its immediates.
//! Indices, operator codes and argument counts are one unsigned byte each;
//! jump targets are 4-byte little-endian absolute offsets into the same block.

use std::fmt;

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Terminate this run without a value
    Halt = 0x00,
    /// Push constant, index is next byte
    PushConst = 0x01,
    /// Push local slot, index is next byte
    PushLocal = 0x02,
    /// Pop top of stack into local slot, index is next byte
    StoreLocal = 0x03,
    /// Discard top of stack
    Pop = 0x04,
    /// Apply operator from the operation table, operator code is next byte
    CallOperation = 0x05,
    /// Call builtin: builtin index byte, argument count byte
    CallBuiltin = 0x06,
    /// Start a worker from a block constant, index is next byte
    StartWorker = 0x07,
    /// Unconditional jump to absolute target (4 bytes)
    Jump = 0x08,
    /// Pop boolean, jump to target if false
    JumpIfFalse = 0x09,
    /// Pop boolean, jump to target if true
    JumpIfTrue = 0x0A,
    /// Call block constant synchronously: block index byte, argument count byte
    CallFunction = 0x0B,
    /// Terminate this run returning the top of stack, if any
    Return = 0x0C,
}

impl Opcode {
    /// Convert byte to opcode, returns None if invalid
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        OPCODE_TABLE.get(byte as usize).copied().flatten()
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Get the number of immediate bytes following this opcode
    #[inline]
    pub fn immediate_size(self) -> usize {
        match self {
            Self::Halt | Self::Pop | Self::Return => 0,

            Self::PushConst
            | Self::PushLocal
            | Self::StoreLocal
            | Self::CallOperation
            | Self::StartWorker => 1,

            // index + argument count
            Self::CallBuiltin | Self::CallFunction => 2,

            Self::Jump | Self::JumpIfFalse | Self::JumpIfTrue => 4,
        }
    }

    /// Get the mnemonic name for this opcode
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::PushConst => "push_const",
            Self::PushLocal => "push_local",
            Self::StoreLocal => "store_local",
            Self::Pop => "pop",
            Self::CallOperation => "call_operation",
            Self::CallBuiltin => "call_builtin",
            Self::StartWorker => "start_worker",
            Self::Jump => "jump",
            Self::JumpIfFalse => "jump_if_false",
            Self::JumpIfTrue => "jump_if_true",
            Self::CallFunction => "call_function",
            Self::Return => "return",
        }
    }

    /// Check if this opcode is a jump instruction
    #[inline]
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIfFalse | Self::JumpIfTrue)
    }

    /// Check if this opcode is a call instruction
    #[inline]
    pub fn is_call(self) -> bool {
        matches!(self, Self::CallBuiltin | Self::CallFunction | Self::StartWorker)
    }

    /// Check if this opcode can terminate execution
    #[inline]
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Halt | Self::Return)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Lookup table for byte -> Opcode conversion
static OPCODE_TABLE: [Option<Opcode>; 256] = {
    let mut table = [None; 256];

    table[0x00] = Some(Opcode::Halt);
    table[0x01] = Some(Opcode::PushConst);
    table[0x02] = Some(Opcode::PushLocal);
    table[0x03] = Some(Opcode::StoreLocal);
    table[0x04] = Some(Opcode::Pop);
    table[0x05] = Some(Opcode::CallOperation);
    table[0x06] = Some(Opcode::CallBuiltin);
    table[0x07] = Some(Opcode::StartWorker);
    table[0x08] = Some(Opcode::Jump);
    table[0x09] = Some(Opcode::JumpIfFalse);
    table[0x0A] = Some(Opcode::JumpIfTrue);
    table[0x0B] = Some(Opcode::CallFunction);
    table[0x0C] = Some(Opcode::Return);

    table
};
