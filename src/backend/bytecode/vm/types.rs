//! Type definitions for the bytecode VM.
//!
//! This module contains the core types used throughout the VM:
//! - VmError: Error types that can occur during execution
//! - IndexKind: Which index space an out-of-range index belongs to
//! - VmConfig: VM configuration options and their loaders

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::backend::bytecode::builtins::BuiltinError;
use crate::backend::bytecode::opcodes::Opcode;
use crate::backend::bytecode::operations::Operator;

/// Result of VM execution
pub type VmResult<T> = Result<T, VmError>;

/// Index spaces an instruction can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Constant,
    Local,
    Jump,
    Builtin,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::Local => "local",
            Self::Jump => "jump target",
            Self::Builtin => "builtin",
        };
        f.write_str(name)
    }
}

/// Errors that abort a single run.
///
/// A failing run never touches the state of any other run.
#[derive(Debug, Clone)]
pub enum VmError {
    /// Fewer operands on the stack than the instruction needs
    StackUnderflow { opcode: Opcode },
    /// Operand tag not accepted at an operator, builtin or opcode site
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        site: &'static str,
    },
    /// Constant, local, jump or builtin index out of range
    IndexOutOfRange { kind: IndexKind, index: usize },
    /// Operator code not present in the operation table
    UnknownOperator(u8),
    /// Invalid opcode byte
    UnknownOpcode(u8),
    /// Operator present in the table but deliberately not implemented
    UnimplementedOperator(Operator),
    /// Division or remainder by zero
    DivisionByZero,
    /// Builtin rejected its arguments
    BuiltinArgument(BuiltinError),
    /// Instruction operands run past the end of the block
    TruncatedInstruction { offset: usize },
    /// Operand stack grew past the configured limit
    StackOverflow { limit: usize },
    /// Nested CALL_FUNCTION depth exceeded the configured limit
    CallDepthExceeded { limit: usize },
    /// A weak block reference whose block has been dropped
    DanglingBlock,
    /// A worker run panicked; the payload message is kept
    WorkerPanicked(String),
    /// Result of a big-integer operator would exceed the size cap
    BigIntTooLarge {
        operator: Operator,
        bits: u64,
        limit: u64,
    },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow { opcode } => write!(f, "Stack underflow in {}", opcode),
            Self::TypeMismatch {
                expected,
                found,
                site,
            } => write!(f, "Type error in {}: expected {}, got {}", site, expected, found),
            Self::IndexOutOfRange { kind, index } => {
                write!(f, "Invalid {} index: {}", kind, index)
            }
            Self::UnknownOperator(code) => write!(f, "Unknown operator code: {}", code),
            Self::UnknownOpcode(b) => write!(f, "Invalid opcode: 0x{:02x}", b),
            Self::UnimplementedOperator(op) => {
                write!(f, "Operator {} is not implemented", op.mnemonic())
            }
            Self::DivisionByZero => write!(f, "Division by zero"),
            Self::BuiltinArgument(e) => write!(f, "Builtin argument error: {}", e),
            Self::TruncatedInstruction { offset } => {
                write!(f, "Truncated instruction at offset {}", offset)
            }
            Self::StackOverflow { limit } => {
                write!(f, "Value stack overflow (limit {})", limit)
            }
            Self::CallDepthExceeded { limit } => {
                write!(f, "Call depth exceeded (limit {})", limit)
            }
            Self::DanglingBlock => write!(f, "Block reference outlived its block"),
            Self::WorkerPanicked(msg) => write!(f, "Worker panicked: {}", msg),
            Self::BigIntTooLarge {
                operator,
                bits,
                limit,
            } => write!(
                f,
                "Result of {} would need {} bits (limit {})",
                operator.mnemonic(),
                bits,
                limit
            ),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BuiltinArgument(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BuiltinError> for VmError {
    fn from(e: BuiltinError) -> Self {
        VmError::BuiltinArgument(e)
    }
}

/// Configuration for the VM
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum operand stack size per run
    pub max_stack: usize,
    /// Maximum nesting of CALL_FUNCTION runs
    pub max_call_depth: usize,
    /// Trace every executed instruction
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack: 65536,
            max_call_depth: 1024,
            trace: false,
        }
    }
}

/// Wrapper matching the `[vm]` table of a configuration file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    vm: VmConfig,
}

/// Errors raised while loading a [`VmConfig`]
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config: {}", e),
            Self::Parse(e) => write!(f, "failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl VmConfig {
    /// Defaults overridden by `MPL_VM_MAX_STACK`, `MPL_VM_MAX_CALL_DEPTH`
    /// and `MPL_VM_TRACE`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_usize("MPL_VM_MAX_STACK") {
            self.max_stack = n;
        }
        if let Some(n) = env_usize("MPL_VM_MAX_CALL_DEPTH") {
            self.max_call_depth = n;
        }
        if let Ok(v) = std::env::var("MPL_VM_TRACE") {
            self.trace = matches!(v.as_str(), "1" | "true" | "yes" | "on");
        }
        self
    }

    /// Parse the `[vm]` table of a TOML document. Missing keys keep defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(input).map_err(ConfigError::Parse)?;
        Ok(file.vm)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n: &usize| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_stack, 65536);
        assert_eq!(config.max_call_depth, 1024);
        assert!(!config.trace);
    }

    #[test]
    fn test_config_from_toml_partial() {
        let config = VmConfig::from_toml_str(
            r#"
            [vm]
            max_call_depth = 64
            trace = true
            "#,
        )
        .expect("valid config");
        assert_eq!(config.max_call_depth, 64);
        assert!(config.trace);
        assert_eq!(config.max_stack, 65536);
    }

    #[test]
    fn test_config_from_empty_toml() {
        let config = VmConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, VmConfig::default());
    }

    #[test]
    fn test_config_rejects_bad_types() {
        let result = VmConfig::from_toml_str("[vm]\nmax_stack = \"lots\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_error_display() {
        let err = VmError::IndexOutOfRange {
            kind: IndexKind::Jump,
            index: 99,
        };
        assert_eq!(err.to_string(), "Invalid jump target index: 99");

        let err = VmError::TypeMismatch {
            expected: "Number",
            found: "Text",
            site: "add",
        };
        assert_eq!(err.to_string(), "Type error in add: expected Number, got Text");
    }
}
