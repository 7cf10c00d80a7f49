//! Boundary call wrappers
//!
//! Wrapped variants of the engine operations that can raise natively. Each
//! wrapper behaves identically to the raw operation on success; on failure
//! it captures the raise inside a protected scope that is wholly contained
//! in the wrapper invocation, so the jump never travels past the call site.
//! The captured failure is re-encoded as an error-channel pair and reported
//! through an ordinary [`CallStatus`].
//!
//! The protected scope costs a little on every call compared to invoking
//! the raw operation directly; `benches/boundary.rs` keeps the number
//! honest.
//!
//! Every wrapper documents its stack effect. On ERROR the operands the
//! operation would have consumed are dropped and the stack holds exactly
//! the error-channel pair in their place.

use causeway_engine::{ArithOp, CallStatus, Engine, EngineError, Protected, Value};

use crate::channel::{self, ErrorPayload};
use crate::config::WrapPolicy;
use crate::translate::BridgeError;

/// Run a raw operation inside a locally contained protected scope.
///
/// `consumes` is how many operands the operation takes off the stack; on a
/// captured raise those operands are dropped so the error pair sits exactly
/// where the results would have been.
fn protect<F>(engine: &mut Engine, consumes: usize, f: F) -> Result<CallStatus, BridgeError>
where
    F: FnOnce(&mut Engine) -> Result<(), EngineError>,
{
    match engine.raw_protected_scope(f)? {
        Protected::Returned(()) => Ok(CallStatus::Ok),
        Protected::Raised(values) => {
            let message = values.into_iter().next_back().unwrap_or(Value::Null);
            tracing::trace!(
                target: "causeway::boundary",
                message = %message,
                "captured native raise in wrapper"
            );
            let target = engine.depth().saturating_sub(consumes);
            engine.truncate(target);
            channel::encode(engine, &ErrorPayload::new(message));
            Ok(CallStatus::Error)
        }
    }
}

/// Wrapped arithmetic.
///
/// Stack: consumes 2, produces 1 on OK; produces the error pair on ERROR.
pub fn arith(engine: &mut Engine, op: ArithOp) -> Result<CallStatus, BridgeError> {
    protect(engine, 2, |e| e.raw_arith(op))
}

/// Wrapped concatenation of the top `n` values.
///
/// Stack: consumes `n`, produces 1 on OK; produces the error pair on ERROR.
pub fn concat(engine: &mut Engine, n: usize) -> Result<CallStatus, BridgeError> {
    protect(engine, n, |e| e.raw_concat(n))
}

/// Wrapped global lookup.
///
/// Stack: consumes 0, produces 1 on OK; produces the error pair on ERROR.
pub fn get_global(engine: &mut Engine, name: &str) -> Result<CallStatus, BridgeError> {
    protect(engine, 0, |e| {
        e.raw_get_global(name);
        Ok(())
    })
}

/// Wrapped in-place numeric coercion of the slot at `idx`.
///
/// Stack: net 0 on OK; produces the error pair on ERROR (the slot is left
/// unchanged).
pub fn coerce_number(engine: &mut Engine, idx: i32) -> Result<CallStatus, BridgeError> {
    protect(engine, 0, |e| e.raw_coerce_number(idx))
}

/// A boundary operation as dispatched by the session layer.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryOp {
    Arith(ArithOp),
    Concat(usize),
    GetGlobal(String),
    CoerceNumber(i32),
    Push(Value),
    Pop,
}

impl BoundaryOp {
    /// Whether the underlying raw operation can fail natively.
    ///
    /// Pure stack motion cannot raise; the classification is what the
    /// curated wrap policy consults.
    pub fn can_raise(&self) -> bool {
        match self {
            BoundaryOp::Arith(_)
            | BoundaryOp::Concat(_)
            | BoundaryOp::GetGlobal(_)
            | BoundaryOp::CoerceNumber(_) => true,
            BoundaryOp::Push(_) | BoundaryOp::Pop => false,
        }
    }
}

/// Dispatch one boundary operation under the given wrap policy.
///
/// Operations classified `can_raise` always run wrapped; that is a
/// correctness requirement, not a policy choice. The policy only decides
/// whether the infallible operations also pay for a protected scope
/// (`WrapPolicy::Complete`) or run direct (`WrapPolicy::Curated`).
pub fn dispatch(
    engine: &mut Engine,
    op: &BoundaryOp,
    policy: WrapPolicy,
) -> Result<CallStatus, BridgeError> {
    match op {
        BoundaryOp::Arith(a) => arith(engine, *a),
        BoundaryOp::Concat(n) => concat(engine, *n),
        BoundaryOp::GetGlobal(name) => get_global(engine, name),
        BoundaryOp::CoerceNumber(idx) => coerce_number(engine, *idx),
        BoundaryOp::Push(value) => {
            if policy.wraps_infallible() {
                protect(engine, 0, |e| {
                    e.push(value.clone());
                    Ok(())
                })
            } else {
                engine.push(value.clone());
                Ok(CallStatus::Ok)
            }
        }
        BoundaryOp::Pop => {
            if policy.wraps_infallible() {
                protect(engine, 0, |e| {
                    e.pop()?;
                    Ok(())
                })
            } else {
                engine.pop()?;
                Ok(CallStatus::Ok)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arith_ok_leaves_declared_results() {
        let mut engine = Engine::new();
        engine.push(Value::Number(6.0));
        engine.push(Value::Number(7.0));
        let status = arith(&mut engine, ArithOp::Mul).unwrap();
        assert_eq!(status, CallStatus::Ok);
        assert_eq!(engine.depth(), 1);
        assert_eq!(engine.pop().unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_arith_error_leaves_exactly_the_pair() {
        let mut engine = Engine::new();
        engine.push(Value::Number(3.0)); // bystander
        engine.push(Value::Null);
        engine.push(Value::Number(1.0));
        let status = arith(&mut engine, ArithOp::Add).unwrap();
        assert_eq!(status, CallStatus::Error);
        // Operands replaced by the pair; the bystander survives.
        assert_eq!(engine.depth(), 3);
        assert!(channel::pair_present(&engine));
        let payload = channel::decode(&mut engine).unwrap();
        assert_eq!(
            payload.message,
            Value::string("attempt to perform arithmetic on a null value")
        );
        assert_eq!(engine.pop().unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_concat_error_drops_all_operands() {
        let mut engine = Engine::new();
        engine.push(Value::string("a"));
        engine.push(Value::Bool(true));
        engine.push(Value::string("b"));
        let status = concat(&mut engine, 3).unwrap();
        assert_eq!(status, CallStatus::Error);
        assert_eq!(engine.depth(), 2);
        let payload = channel::decode(&mut engine).unwrap();
        assert_eq!(
            payload.message,
            Value::string("attempt to concatenate a boolean value")
        );
        assert_eq!(engine.depth(), 0);
    }

    #[test]
    fn test_get_global_ok_and_error() {
        let mut engine = Engine::new();
        engine.set_global("answer", Value::Number(42.0));
        assert_eq!(get_global(&mut engine, "answer").unwrap(), CallStatus::Ok);
        assert_eq!(engine.pop().unwrap(), Value::Number(42.0));

        assert_eq!(get_global(&mut engine, "answre").unwrap(), CallStatus::Error);
        let payload = channel::decode(&mut engine).unwrap();
        assert_eq!(payload.message, Value::string("undefined global 'answre'"));
    }

    #[test]
    fn test_coerce_number_error_keeps_slot() {
        let mut engine = Engine::new();
        engine.push(Value::string("not a number"));
        let status = coerce_number(&mut engine, 1).unwrap();
        assert_eq!(status, CallStatus::Error);
        channel::decode(&mut engine).unwrap();
        assert_eq!(engine.value_at(1).unwrap(), &Value::string("not a number"));
    }

    #[test]
    fn test_dispatch_policy_only_affects_infallible_ops() {
        for policy in [WrapPolicy::Curated, WrapPolicy::Complete] {
            let mut engine = Engine::new();
            let status =
                dispatch(&mut engine, &BoundaryOp::Push(Value::Number(1.0)), policy).unwrap();
            assert_eq!(status, CallStatus::Ok);
            let status = dispatch(&mut engine, &BoundaryOp::Pop, policy).unwrap();
            assert_eq!(status, CallStatus::Ok);
            assert_eq!(engine.depth(), 0);

            // Failure-prone ops are wrapped under either policy.
            let status = dispatch(
                &mut engine,
                &BoundaryOp::GetGlobal("missing".to_string()),
                policy,
            )
            .unwrap();
            assert_eq!(status, CallStatus::Error);
            channel::decode(&mut engine).unwrap();
        }
    }

    #[test]
    fn test_dispatch_pop_underflow_is_host_misuse() {
        let mut engine = Engine::new();
        let result = dispatch(&mut engine, &BoundaryOp::Pop, WrapPolicy::Curated);
        assert!(matches!(
            result,
            Err(BridgeError::Engine(EngineError::StackUnderflow))
        ));
    }

    #[test]
    fn test_classification() {
        assert!(BoundaryOp::Arith(ArithOp::Add).can_raise());
        assert!(BoundaryOp::GetGlobal("x".into()).can_raise());
        assert!(!BoundaryOp::Push(Value::Null).can_raise());
        assert!(!BoundaryOp::Pop.can_raise());
    }
}
