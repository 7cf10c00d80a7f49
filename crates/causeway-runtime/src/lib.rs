//! Causeway Runtime - Safe call boundary over the causeway engine
//!
//! The engine signals errors with a non-local jump on the native call
//! stack. Left alone, such a jump can unwind through host frames the
//! engine knows nothing about. This crate guarantees that never happens
//! while keeping both sides on their native idioms:
//! - Host code calls in through the protected-call gate or through wrapped
//!   boundary operations, and gets ordinary `Result` values back.
//! - Host-exposed functions signal failure by returning an errored
//!   outcome; the glue encodes it on the error channel and the engine
//!   raises from its own frame.
//!
//! # Example
//!
//! ```
//! use causeway_runtime::{BridgeConfig, Session, Value};
//!
//! let mut session = Session::new(BridgeConfig::default());
//! session.register_function("add", 2, |args| {
//!     let a = args[0].as_number().ok_or("expected number")?;
//!     let b = args[1].as_number().ok_or("expected number")?;
//!     Ok(Value::Number(a + b))
//! });
//! let results = session
//!     .call("add", &[Value::Number(1.0), Value::Number(2.0)])
//!     .unwrap();
//! assert_eq!(results, vec![Value::Number(3.0)]);
//! ```

/// Runtime crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod channel;
pub mod checked;
pub mod config;
pub mod gate;
pub mod session;
pub mod translate;

// Re-export the engine's call surface alongside the bridge types
pub use causeway_engine::{
    ArithOp, CallStatus, Engine, EngineError, FuncRef, OpaqueToken, Protected, RawFn, RawReturn,
    ResultMode, Value,
};

pub use channel::{ChannelError, ErrorPayload};
pub use checked::BoundaryOp;
pub use config::{BridgeConfig, ConfigError, WrapPolicy};
pub use session::Session;
pub use translate::{BridgeError, ErrorOrigin, HostContext, HostFnError};
