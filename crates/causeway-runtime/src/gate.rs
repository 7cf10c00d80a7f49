//! Protected-call gate
//!
//! The single sanctioned entry point for invoking a VM function directly
//! from host code with the engine's native catch mechanism, unwrapped.
//!
//! The safety argument: the gate invokes the target directly from host
//! code, so between a raise inside the call and the catch here there are
//! only engine-managed frames. Nothing of the host's is in the way, and
//! the jump terminates exactly at the gate. No other location may use the
//! raw protected-call primitive for a full call, and the gate must be the
//! direct mechanism by which host code enters the VM, never something
//! reached mid-wrapper with live host frames interposed.

use causeway_engine::{CallStatus, Engine, ResultMode};

use crate::translate::{self, BridgeError};

/// Invoke the function at `-(nargs + 1)` under the engine's native catch.
///
/// Status form of the gate: returns the raw OK/ERROR status and, on ERROR,
/// leaves the error message (or channel pair) on the stack for the caller
/// to decode before any other stack operation.
///
/// Stack: consumes the function and `nargs` arguments; leaves results
/// adjusted per `mode`, or the error state on ERROR.
pub fn protected_call_status(
    engine: &mut Engine,
    nargs: usize,
    mode: ResultMode,
) -> Result<CallStatus, BridgeError> {
    let span = tracing::trace_span!(target: "causeway::boundary", "protected_call", nargs);
    let _enter = span.enter();
    Ok(engine.raw_protected_call(nargs, mode)?)
}

/// Invoke the function at `-(nargs + 1)` and translate failure immediately.
///
/// On ERROR the pending error is decoded into a [`BridgeError`] right here,
/// strictly in host code, and the stack is left without any error remnant.
pub fn protected_call(
    engine: &mut Engine,
    nargs: usize,
    mode: ResultMode,
) -> Result<(), BridgeError> {
    match protected_call_status(engine, nargs, mode)? {
        CallStatus::Ok => Ok(()),
        CallStatus::Error => Err(translate::error_after_call(engine)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_engine::{RawReturn, Value};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_gate_translates_script_raise() {
        let mut engine = Engine::new();
        engine.register(
            "explode",
            Arc::new(|e: &mut Engine| e.raise(Value::string("kaboom"))),
        );
        let f = engine.global("explode").unwrap();
        engine.push(f);
        let err = protected_call(&mut engine, 0, ResultMode::All).unwrap_err();
        assert_eq!(err.message().as_deref(), Some("kaboom"));
        // Nothing left behind: no results, no error remnant.
        assert_eq!(engine.depth(), 0);
    }

    #[test]
    fn test_gate_status_form_leaves_error_on_stack() {
        let mut engine = Engine::new();
        engine.register(
            "explode",
            Arc::new(|e: &mut Engine| e.raise(Value::string("kaboom"))),
        );
        let f = engine.global("explode").unwrap();
        engine.push(f);
        let status = protected_call_status(&mut engine, 0, ResultMode::All).unwrap();
        assert_eq!(status, CallStatus::Error);
        assert_eq!(engine.depth(), 1);
        assert_eq!(engine.pop().unwrap(), Value::string("kaboom"));
    }

    #[test]
    fn test_gate_ok_path_is_transparent() {
        let mut engine = Engine::new();
        engine.register(
            "ok",
            Arc::new(|e: &mut Engine| {
                e.push(Value::Bool(true));
                RawReturn::Results(1)
            }),
        );
        let f = engine.global("ok").unwrap();
        engine.push(f);
        protected_call(&mut engine, 0, ResultMode::Exactly(1)).unwrap();
        assert_eq!(engine.pop().unwrap(), Value::Bool(true));
    }
}
