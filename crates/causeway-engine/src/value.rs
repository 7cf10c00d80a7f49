//! Engine value representation
//!
//! Shared value representation for everything that crosses the engine's call
//! stack.
//! - Numbers, Bools, Null: Immediate values (stack-allocated)
//! - Strings: Heap-allocated, reference-counted (Arc<String>), immutable
//! - Functions: References into the engine's callable registry
//! - Tokens: Opaque marker values with a process-unique identity, used by
//!   embedders for keys that script code must not be able to forge

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reference to a callable in an engine's registry.
///
/// Only valid for the engine instance that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuncRef(pub(crate) usize);

impl FuncRef {
    /// Registry slot of the callable (for display and diagnostics only).
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Opaque marker value with a process-unique identity.
///
/// Tokens compare equal only to clones of themselves. The inner id is
/// private, so code outside this crate can only obtain a given token by
/// being handed one — script code cannot conjure a colliding value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpaqueToken {
    id: u64,
}

impl OpaqueToken {
    /// Allocate a token distinct from every token created before it.
    pub fn unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// A value on the engine's call stack.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<String>),
    Function(FuncRef),
    Token(OpaqueToken),
}

impl Value {
    /// Convenience constructor for string values.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Arc::new(s.into()))
    }

    /// Type name used in engine error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
            Value::Token(_) => "token",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric coercion: numbers pass through, strings are parsed.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Whether the value participates in string concatenation.
    pub fn is_concatenable(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Str(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Function(fref) => write!(f, "<function #{}>", fref.0),
            Value::Token(_) => write!(f, "<token>"),
        }
    }
}
