//! Builtin Function Registry
//!
//! Native Rust functions callable from bytecode via `CALL_BUILTIN`.
//!
//! # Design
//!
//! Builtins are registered by name and assigned sequential one-byte IDs. The
//! VM calls them by ID with the popped arguments in push order. A builtin
//! returns at most one value; `None` means nothing is pushed.
//!
//! The standard registry holds `print` (ID 0) and `sleep` (ID 1) and is
//! shared process-wide, read-only.
//!
//! # Example
//!
//! ```
//! use mpl::backend::bytecode::builtins::{BuiltinContext, BuiltinRegistry};
//! use mpl::backend::models::Value;
//!
//! let mut registry = BuiltinRegistry::with_stdlib();
//! let id = registry.register("double", |args, _ctx| {
//!     Ok(args.first().and_then(Value::as_number).map(|n| Value::Number(n * 2.0)))
//! });
//!
//! let result = registry.call(id, &[Value::Number(21.0)], &BuiltinContext::default());
//! assert_eq!(result.unwrap(), Some(Value::Number(42.0)));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::backend::models::Value;

/// ID of the standard `print` builtin
pub const PRINT: u8 = 0;
/// ID of the standard `sleep` builtin
pub const SLEEP: u8 = 1;

/// Result type for builtin calls
pub type BuiltinResult = Result<Option<Value>, BuiltinError>;

/// Error type for builtin calls
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinError {
    /// Wrong number of arguments
    ArityMismatch {
        builtin: &'static str,
        expected: usize,
        got: usize,
    },
    /// Argument of the wrong tag
    TypeError {
        builtin: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    /// Argument has the right tag but an unusable value
    InvalidArgument {
        builtin: &'static str,
        reason: String,
    },
    /// Writing to the output channel failed
    Output(String),
    /// Builtin ID not registered
    NotFound(u8),
}

impl fmt::Display for BuiltinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArityMismatch {
                builtin,
                expected,
                got,
            } => write!(f, "{}: expected {} argument(s), got {}", builtin, expected, got),
            Self::TypeError {
                builtin,
                expected,
                got,
            } => write!(f, "{}: expected {}, got {}", builtin, expected, got),
            Self::InvalidArgument { builtin, reason } => write!(f, "{}: {}", builtin, reason),
            Self::Output(msg) => write!(f, "output error: {}", msg),
            Self::NotFound(id) => write!(f, "builtin {} not found", id),
        }
    }
}

impl std::error::Error for BuiltinError {}

/// Side-effecting output channel used by `print`
#[derive(Clone, Default)]
pub enum OutputSink {
    /// Write lines to the process stdout
    #[default]
    Stdout,
    /// Collect lines in memory
    Capture(Arc<Mutex<Vec<String>>>),
}

impl OutputSink {
    /// Create an empty in-memory sink
    pub fn capture() -> Self {
        OutputSink::Capture(Arc::new(Mutex::new(Vec::new())))
    }

    /// Write one line
    pub fn write_line(&self, line: &str) -> Result<(), BuiltinError> {
        match self {
            OutputSink::Stdout => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "{}", line).map_err(|e| BuiltinError::Output(e.to_string()))
            }
            OutputSink::Capture(lines) => {
                lines.lock().push(line.to_string());
                Ok(())
            }
        }
    }

    /// Lines captured so far. Always empty for stdout.
    pub fn lines(&self) -> Vec<String> {
        match self {
            OutputSink::Stdout => Vec::new(),
            OutputSink::Capture(lines) => lines.lock().clone(),
        }
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSink::Stdout => f.write_str("Stdout"),
            OutputSink::Capture(lines) => write!(f, "Capture({} lines)", lines.lock().len()),
        }
    }
}

/// Context provided to builtins during execution
#[derive(Debug, Clone, Default)]
pub struct BuiltinContext {
    pub output: OutputSink,
}

impl BuiltinContext {
    pub fn new(output: OutputSink) -> Self {
        Self { output }
    }
}

/// Type alias for builtin function signature
pub type BuiltinFn = Arc<dyn Fn(&[Value], &BuiltinContext) -> BuiltinResult + Send + Sync>;

/// Registry entry for a builtin
struct RegistryEntry {
    name: String,
    func: BuiltinFn,
}

/// Registry for builtins callable from bytecode
///
/// Functions are registered by name and assigned sequential IDs starting from 0.
/// The registry is append-only; functions cannot be removed or reassigned.
pub struct BuiltinRegistry {
    /// Functions stored by ID (index)
    functions: Vec<RegistryEntry>,
    /// Name to ID mapping for registration lookup
    name_to_id: HashMap<String, u8>,
}

impl fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("function_count", &self.functions.len())
            .field("names", &self.functions.iter().map(|e| &e.name).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static STANDARD: LazyLock<Arc<BuiltinRegistry>> =
    LazyLock::new(|| Arc::new(BuiltinRegistry::with_stdlib()));

impl BuiltinRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
            name_to_id: HashMap::new(),
        }
    }

    /// Create a registry with `print` and `sleep` pre-registered
    pub fn with_stdlib() -> Self {
        let mut registry = Self::new();
        registry.register_stdlib();
        registry
    }

    /// The shared, immutable standard registry
    pub fn standard() -> Arc<BuiltinRegistry> {
        Arc::clone(&STANDARD)
    }

    /// Register a builtin, returning its ID
    ///
    /// If a builtin with this name already exists, returns its existing ID.
    ///
    /// # Panics
    ///
    /// Panics when registering a 257th builtin; IDs are encoded in one byte.
    pub fn register<F>(&mut self, name: &str, func: F) -> u8
    where
        F: Fn(&[Value], &BuiltinContext) -> BuiltinResult + Send + Sync + 'static,
    {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }

        assert!(
            self.functions.len() <= u8::MAX as usize,
            "builtin registry is full"
        );
        let id = self.functions.len() as u8;
        self.functions.push(RegistryEntry {
            name: name.to_string(),
            func: Arc::new(func),
        });
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    /// Get the ID of a registered builtin by name
    pub fn get_id(&self, name: &str) -> Option<u8> {
        self.name_to_id.get(name).copied()
    }

    /// Get the name of a registered builtin by ID
    pub fn get_name(&self, id: u8) -> Option<&str> {
        self.functions.get(id as usize).map(|e| e.name.as_str())
    }

    /// Call a builtin by ID
    pub fn call(&self, id: u8, args: &[Value], ctx: &BuiltinContext) -> BuiltinResult {
        let entry = self
            .functions
            .get(id as usize)
            .ok_or(BuiltinError::NotFound(id))?;

        (entry.func)(args, ctx)
    }

    /// Get the number of registered builtins
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_stdlib(&mut self) {
        let print = self.register("print", builtin_print);
        let sleep = self.register("sleep", builtin_sleep);
        debug_assert_eq!((print, sleep), (PRINT, SLEEP));
    }
}

/// Write each argument's textual form as its own line.
fn builtin_print(args: &[Value], ctx: &BuiltinContext) -> BuiltinResult {
    for arg in args {
        ctx.output.write_line(&arg.to_string())?;
    }
    Ok(None)
}

/// Suspend the calling thread for the given number of milliseconds.
fn builtin_sleep(args: &[Value], _ctx: &BuiltinContext) -> BuiltinResult {
    if args.len() != 1 {
        return Err(BuiltinError::ArityMismatch {
            builtin: "sleep",
            expected: 1,
            got: args.len(),
        });
    }

    let invalid = || BuiltinError::InvalidArgument {
        builtin: "sleep",
        reason: format!("duration must be a finite, non-negative number, got {}", args[0]),
    };

    let duration = match &args[0] {
        Value::Number(ms) if ms.is_finite() && *ms >= 0.0 => {
            Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| BuiltinError::InvalidArgument {
                builtin: "sleep",
                reason: format!("duration of {} ms is out of range", ms),
            })?
        }
        Value::MachineInt(ms) if *ms >= 0 => Duration::from_millis(*ms as u64),
        Value::Number(_) | Value::MachineInt(_) => return Err(invalid()),
        other => {
            return Err(BuiltinError::TypeError {
                builtin: "sleep",
                expected: "Number or MachineInt",
                got: other.type_name(),
            })
        }
    };

    trace!(target: "mpl::builtins", millis = duration.as_millis() as u64, "sleep");
    std::thread::sleep(duration);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_register_and_call() {
        let mut registry = BuiltinRegistry::new();

        let id = registry.register("add2", |args, _ctx| {
            let a = args.first().and_then(Value::as_number).unwrap_or(0.0);
            let b = args.get(1).and_then(Value::as_number).unwrap_or(0.0);
            Ok(Some(Value::Number(a + b)))
        });

        assert_eq!(id, 0);

        let ctx = BuiltinContext::default();
        let result = registry
            .call(id, &[Value::Number(10.0), Value::Number(32.0)], &ctx)
            .expect("call should succeed");

        assert_eq!(result, Some(Value::Number(42.0)));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = BuiltinRegistry::new();

        let id1 = registry.register("foo", |_args, _ctx| Ok(Some(Value::Number(1.0))));
        let id2 = registry.register("foo", |_args, _ctx| Ok(Some(Value::Number(2.0))));

        assert_eq!(id1, id2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtin_not_found() {
        let registry = BuiltinRegistry::new();
        let ctx = BuiltinContext::default();

        let result = registry.call(99, &[], &ctx);
        assert_eq!(result, Err(BuiltinError::NotFound(99)));
    }

    #[test]
    fn test_stdlib_ids() {
        let registry = BuiltinRegistry::standard();
        assert_eq!(registry.get_id("print"), Some(PRINT));
        assert_eq!(registry.get_id("sleep"), Some(SLEEP));
        assert_eq!(registry.get_name(SLEEP), Some("sleep"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_print_writes_one_line_per_argument() {
        let registry = BuiltinRegistry::with_stdlib();
        let ctx = BuiltinContext::new(OutputSink::capture());

        let result = registry
            .call(
                PRINT,
                &[Value::text("a"), Value::Number(1.0), Value::Boolean(true)],
                &ctx,
            )
            .expect("print should succeed");

        assert_eq!(result, None);
        assert_eq!(ctx.output.lines(), vec!["a", "1", "true"]);
    }

    #[test]
    fn test_sleep_accepts_numbers() {
        let registry = BuiltinRegistry::with_stdlib();
        let ctx = BuiltinContext::default();

        let start = Instant::now();
        assert_eq!(registry.call(SLEEP, &[Value::Number(20.0)], &ctx), Ok(None));
        assert_eq!(registry.call(SLEEP, &[Value::MachineInt(5)], &ctx), Ok(None));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_sleep_rejects_bad_arguments() {
        let registry = BuiltinRegistry::with_stdlib();
        let ctx = BuiltinContext::default();

        assert!(matches!(
            registry.call(SLEEP, &[Value::text("soon")], &ctx),
            Err(BuiltinError::TypeError { got: "Text", .. })
        ));
        assert!(matches!(
            registry.call(SLEEP, &[], &ctx),
            Err(BuiltinError::ArityMismatch { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            registry.call(SLEEP, &[Value::Number(-1.0)], &ctx),
            Err(BuiltinError::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.call(SLEEP, &[Value::Number(f64::NAN)], &ctx),
            Err(BuiltinError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_sleep_rejects_duration_out_of_range() {
        let registry = BuiltinRegistry::with_stdlib();
        let ctx = BuiltinContext::default();

        let start = Instant::now();
        for ms in [1e300, f64::MAX] {
            assert!(matches!(
                registry.call(SLEEP, &[Value::Number(ms)], &ctx),
                Err(BuiltinError::InvalidArgument { builtin: "sleep", .. })
            ));
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
