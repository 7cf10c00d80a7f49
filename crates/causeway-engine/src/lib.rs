//! Causeway Engine - Reference stack engine and low-level call surface
//!
//! This crate is the embedded side of the causeway boundary: a stack-based
//! engine whose native error signaling is a non-local jump on the native
//! call stack. Embedders reach the engine only through the fixed surface
//! exposed here:
//! - Raw stack primitives (push/pop/index/type inspection)
//! - The native raise primitive (`Engine::raise`)
//! - The native protected-call primitives (`raw_protected_call`,
//!   `raw_protected_scope`)
//! - Callable registration with a fixed calling convention
//!
//! Safe embedding discipline (confining raises so they never unwind through
//! embedder frames) lives in the `causeway-runtime` crate; this crate only
//! provides the mechanism.

use thiserror::Error;

/// Engine crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod engine;
pub mod stack;
pub mod value;

// Re-export commonly used types
pub use engine::{
    ArithOp, CallStatus, Engine, Protected, RawFn, RawReturn, ResultMode, DEFAULT_STACK_LIMIT,
};
pub use stack::Stack;
pub use value::{FuncRef, OpaqueToken, Value};

/// Errors on the call surface that are reported by return value rather than
/// by a native raise: misuse of the API by the embedder, not failures of
/// the operation's own semantics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An operation needed more stack slots than are live
    #[error("stack underflow")]
    StackUnderflow,

    /// An index outside the acceptable range for the current frame
    #[error("invalid stack index: {index}")]
    InvalidIndex { index: i64 },

    /// The configured stack ceiling would be exceeded
    #[error("stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    /// A function value refers to a registry slot that does not exist
    #[error("unknown function (registry slot {index})")]
    UnknownFunction { index: usize },

    /// A callable declared more results than it left on the stack
    #[error("callable declared {declared} results but left fewer")]
    ShortResults { declared: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
