//! Host-side exception translation
//!
//! Bridges the error channel to ordinary Rust error values, in both
//! directions:
//! - VM→Host: an ERROR status observed after a protected call or a wrapped
//!   operation is decoded into a [`BridgeError`] right where the call
//!   returned, strictly in host code.
//! - Host→VM: a host-exposed function signals failure by returning
//!   `Err(HostFnError)`. The glue registered with the engine encodes that
//!   outcome as an error-channel pair and returns the error status; the
//!   engine performs the native raise from its own frame. The function body
//!   itself never raises, so the raise always happens exactly at the frame
//!   boundary the engine expects.
//!
//! Translation is terminal: there are no retries, and recovery belongs to
//! whichever host caller receives the `BridgeError`.

use std::sync::Arc;

use causeway_engine::{Engine, EngineError, FuncRef, RawReturn, Value};
use thiserror::Error;

use crate::channel::{self, ChannelError, ErrorPayload};

/// Where a translated error originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// Raised by VM script code
    Script,
    /// Returned as an errored outcome by a host-exposed function
    HostFunction,
    /// Captured from a failure-prone native operation by a boundary wrapper
    NativeOp,
}

/// The uniform host-side error for everything that crosses the boundary.
///
/// Host code sees one exception type carrying the VM's error message,
/// regardless of whether the failure originated in engine internals, VM
/// script code, or a host-exposed function.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// An error translated from the VM side of the boundary
    #[error("vm error: {}", .payload.text())]
    Vm {
        payload: ErrorPayload,
        origin: ErrorOrigin,
    },

    /// A call named a global that does not exist
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// Host-side misuse of the engine surface
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Malformed error state on the stack
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl BridgeError {
    /// The VM message text, when this error carries one.
    pub fn message(&self) -> Option<String> {
        match self {
            BridgeError::Vm { payload, .. } => Some(payload.text()),
            _ => None,
        }
    }

    /// The VM payload value, preserved exactly as raised.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            BridgeError::Vm { payload, .. } => Some(&payload.message),
            _ => None,
        }
    }

    pub fn origin(&self) -> Option<ErrorOrigin> {
        match self {
            BridgeError::Vm { origin, .. } => Some(*origin),
            _ => None,
        }
    }
}

/// Decode the pending error after a protected call returned ERROR.
///
/// The origin is read off the channel shape: a full pair means the error
/// traveled through the host-function glue; a bare message means VM script
/// code raised it.
pub fn error_after_call(engine: &mut Engine) -> BridgeError {
    let via_pair = channel::pair_present(engine);
    match channel::decode(engine) {
        Ok(payload) => {
            let origin = if via_pair {
                ErrorOrigin::HostFunction
            } else {
                ErrorOrigin::Script
            };
            tracing::debug!(
                target: "causeway::boundary",
                ?origin,
                message = %payload.text(),
                "translated vm error"
            );
            BridgeError::Vm { payload, origin }
        }
        Err(e) => BridgeError::Channel(e),
    }
}

/// Decode the pending error after a wrapped operation returned ERROR.
pub fn error_after_wrapped(engine: &mut Engine) -> BridgeError {
    match channel::decode(engine) {
        Ok(payload) => {
            tracing::debug!(
                target: "causeway::boundary",
                message = %payload.text(),
                "translated native-operation error"
            );
            BridgeError::Vm {
                payload,
                origin: ErrorOrigin::NativeOp,
            }
        }
        Err(e) => BridgeError::Channel(e),
    }
}

// ==================== Host→VM direction ====================

/// Failure signaled by a host-exposed function body.
///
/// Never raised across the boundary directly; the glue layer encodes it
/// onto the error channel on the way back to the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostFnError {
    #[error("{0}")]
    Message(String),

    /// A non-string VM value used as the error payload
    #[error("{0}")]
    Payload(Value),
}

impl HostFnError {
    fn into_payload(self) -> ErrorPayload {
        match self {
            HostFnError::Message(text) => ErrorPayload::new(Value::string(text)),
            HostFnError::Payload(value) => ErrorPayload::new(value),
        }
    }
}

impl From<String> for HostFnError {
    fn from(text: String) -> Self {
        HostFnError::Message(text)
    }
}

impl From<&str> for HostFnError {
    fn from(text: &str) -> Self {
        HostFnError::Message(text.to_string())
    }
}

/// Argument and result access for a host-exposed function body.
///
/// Indices are 1-based, matching the engine's frame-relative convention:
/// `arg(1)` is the first argument.
pub struct HostContext<'a> {
    engine: &'a mut Engine,
}

impl<'a> HostContext<'a> {
    pub fn arg_count(&self) -> usize {
        self.engine.arg_count()
    }

    pub fn arg(&self, index: usize) -> Result<&Value, HostFnError> {
        self.engine.value_at(index as i32).map_err(|_| {
            HostFnError::Message(format!("bad argument #{} (value expected)", index))
        })
    }

    pub fn number_arg(&self, index: usize) -> Result<f64, HostFnError> {
        let value = self.arg(index)?;
        value.as_number().ok_or_else(|| {
            HostFnError::Message(format!(
                "bad argument #{} (number expected, got {})",
                index,
                value.type_name()
            ))
        })
    }

    pub fn str_arg(&self, index: usize) -> Result<String, HostFnError> {
        let value = self.arg(index)?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            HostFnError::Message(format!(
                "bad argument #{} (string expected, got {})",
                index,
                value.type_name()
            ))
        })
    }

    /// All arguments, in order.
    pub fn args(&self) -> Vec<Value> {
        (1..=self.arg_count())
            .map(|i| {
                self.engine
                    .value_at(i as i32)
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }

    /// Push a result.
    pub fn push(&mut self, value: Value) {
        self.engine.push(value);
    }
}

/// Register a host-exposed function under `name`.
///
/// The body returns `Ok(n)` after pushing its `n` results, or
/// `Err(HostFnError)` to signal failure. On failure the glue encodes the
/// error-channel pair and returns the error status to the engine, which
/// raises from its own frame and propagates to the nearest enclosing
/// protected call. One always exists, because the engine only invokes
/// host-exposed functions from inside some protected scope.
pub fn register_host_fn<F>(engine: &mut Engine, name: &str, body: F) -> FuncRef
where
    F: Fn(&mut HostContext) -> Result<usize, HostFnError> + Send + Sync + 'static,
{
    let fn_name = name.to_string();
    engine.register(
        name,
        Arc::new(move |engine: &mut Engine| {
            let outcome = {
                let mut cx = HostContext {
                    engine: &mut *engine,
                };
                body(&mut cx)
            };
            match outcome {
                Ok(results) => RawReturn::Results(results),
                Err(err) => {
                    tracing::debug!(
                        target: "causeway::boundary",
                        function = %fn_name,
                        "host function returned errored outcome"
                    );
                    channel::encode(engine, &err.into_payload());
                    RawReturn::Error { unit: 2 }
                }
            }
        }),
    )
}
