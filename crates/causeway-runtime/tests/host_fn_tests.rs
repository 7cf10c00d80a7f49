//! Host-exposed function tests
//!
//! Covers the host→VM error direction: a host function signals an errored
//! outcome, the glue encodes it on the error channel, and the engine's own
//! propagation carries it to the nearest enclosing protected call.

use std::sync::Arc;

use causeway_runtime::{
    channel, translate, BridgeConfig, CallStatus, Engine, ErrorOrigin, HostFnError, RawReturn,
    ResultMode, Session, Value,
};
use pretty_assertions::assert_eq;

/// Host-exposed file reader that always fails for missing files.
fn register_read_file(session: &mut Session) {
    session.register_raw("read_file", |cx| {
        let path = cx.str_arg(1)?;
        if path == "present.txt" {
            cx.push(Value::string("file contents"));
            Ok(1)
        } else {
            Err(HostFnError::Message("file not found".to_string()))
        }
    });
}

/// Register a "script" function that invokes the named global with the
/// given string argument through an unprotected engine call, mimicking VM
/// code calling a host-exposed function.
fn register_script_caller(engine: &mut Engine, name: &str, target: &'static str) {
    engine.register(
        name,
        Arc::new(move |e: &mut Engine| {
            let arg = e.value_at(1).ok().cloned().unwrap_or(Value::Null);
            let f = e.global(target).unwrap_or(Value::Null);
            e.push(f);
            e.push(arg);
            // Unprotected on purpose: an error in the host function must
            // propagate through this VM frame to the enclosing gate.
            e.raw_call(1, ResultMode::Exactly(1)).unwrap();
            RawReturn::Results(1)
        }),
    );
}

#[test]
fn test_read_file_scenario() {
    let mut session = Session::new(BridgeConfig::default());
    register_read_file(&mut session);
    register_script_caller(session.engine_mut(), "load_config", "read_file");

    let err = session
        .call("load_config", &[Value::string("missing.txt")])
        .unwrap_err();
    assert_eq!(err.message().as_deref(), Some("file not found"));
    assert_eq!(err.origin(), Some(ErrorOrigin::HostFunction));

    // The instance remains usable afterwards.
    let results = session
        .call("load_config", &[Value::string("present.txt")])
        .unwrap();
    assert_eq!(results, vec![Value::string("file contents")]);
}

#[test]
fn test_host_error_restores_depth_to_pre_call_plus_pair() {
    let mut session = Session::new(BridgeConfig::default());
    register_read_file(&mut session);
    register_script_caller(session.engine_mut(), "load_config", "read_file");
    let engine = session.engine_mut();

    let pre_call = engine.depth();
    let f = engine.global("load_config").unwrap();
    engine.push(f);
    engine.push(Value::string("missing.txt"));

    let status = engine.raw_protected_call(1, ResultMode::All).unwrap();
    assert_eq!(status, CallStatus::Error);
    // Function and argument consumed; exactly the error pair remains.
    assert_eq!(engine.depth(), pre_call + 2);
    assert!(channel::pair_present(engine));
    let payload = channel::decode(engine).unwrap();
    assert_eq!(payload.message, Value::string("file not found"));
    assert_eq!(engine.depth(), pre_call);
}

#[test]
fn test_host_fn_value_payload_round_trips() {
    let mut session = Session::new(BridgeConfig::default());
    session.register_raw("fail_with_code", |_| {
        Err(HostFnError::Payload(Value::Number(503.0)))
    });
    let err = session.call("fail_with_code", &[]).unwrap_err();
    assert_eq!(err.payload(), Some(&Value::Number(503.0)));
}

#[test]
fn test_host_fn_never_raises_directly() {
    // The glue converts the errored outcome into a status return; invoking
    // the callable raw (outside any protected scope would be a protocol
    // breach, so we go through one) shows the error unit is the channel
    // pair, not a bare raise from inside the body.
    let mut engine = Engine::new();
    translate::register_host_fn(&mut engine, "deny", |_| {
        Err(HostFnError::Message("denied".to_string()))
    });
    let f = engine.global("deny").unwrap();
    engine.push(f);
    let status = engine.raw_protected_call(0, ResultMode::All).unwrap();
    assert_eq!(status, CallStatus::Error);
    assert!(channel::pair_present(&engine));
    assert_eq!(
        channel::decode(&mut engine).unwrap().message,
        Value::string("denied")
    );
}

#[test]
fn test_nested_host_vm_host_error_path() {
    // host → VM script → host function that fails: the error crosses the
    // boundary twice and still arrives intact.
    let mut session = Session::new(BridgeConfig::default());
    register_read_file(&mut session);
    register_script_caller(session.engine_mut(), "inner_caller", "read_file");
    register_script_caller(session.engine_mut(), "outer_caller", "inner_caller");

    let err = session
        .call("outer_caller", &[Value::string("missing.txt")])
        .unwrap_err();
    assert_eq!(err.message().as_deref(), Some("file not found"));
    assert_eq!(session.engine().depth(), 0);
}

#[test]
fn test_host_fn_success_leaves_declared_results_only() {
    let mut session = Session::new(BridgeConfig::default());
    register_read_file(&mut session);
    let results = session
        .call("read_file", &[Value::string("present.txt")])
        .unwrap();
    assert_eq!(results, vec![Value::string("file contents")]);
    assert_eq!(session.engine().depth(), 0);
}
