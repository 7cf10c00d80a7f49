//! Host-facing session API
//!
//! A `Session` owns one engine instance and is the way host application
//! code drives it: named calls through the protected-call gate, host
//! function registration through the translation glue, and boundary
//! operations dispatched under the configured wrap policy.
//!
//! Exclusive ownership is structural: every mutating method takes
//! `&mut self`, so whichever caller is inside the instance's call chain
//! holds the only mutation rights until it returns. `Session::scope`
//! provides the acquire-use-release shape; the engine is torn down on
//! every exit path, normal or not, because release lives in `Drop`.

use causeway_engine::{CallStatus, Engine, ResultMode, Value};

use crate::checked::{self, BoundaryOp};
use crate::config::BridgeConfig;
use crate::gate;
use crate::translate::{self, BridgeError, HostContext, HostFnError};

/// One engine instance plus the policy it runs under.
pub struct Session {
    engine: Engine,
    config: BridgeConfig,
}

impl Session {
    pub fn new(config: BridgeConfig) -> Self {
        tracing::debug!(
            target: "causeway::session",
            policy = ?config.wrap_policy,
            stack_limit = config.stack_limit,
            "session acquired"
        );
        Self {
            engine: Engine::with_stack_limit(config.stack_limit),
            config,
        }
    }

    /// Acquire a session, run `f`, and release the instance on every exit
    /// path (normal return, error return, unwind).
    pub fn scope<T>(
        config: BridgeConfig,
        f: impl FnOnce(&mut Session) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        let mut session = Session::new(config);
        f(&mut session)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Direct access to the engine's low-level surface.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    // ==================== Globals ====================

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.engine.set_global(name, value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.engine.global(name)
    }

    // ==================== Host function registration ====================

    /// Register a fixed-arity host function.
    ///
    /// The implementation receives exactly `arity` arguments and returns a
    /// single value or an errored outcome. Argument-count validation runs
    /// before the implementation.
    pub fn register_function<F>(&mut self, name: &str, arity: usize, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, HostFnError> + Send + Sync + 'static,
    {
        let fn_name = name.to_string();
        translate::register_host_fn(&mut self.engine, name, move |cx| {
            let got = cx.arg_count();
            if got != arity {
                return Err(HostFnError::Message(format!(
                    "function '{}' expects {} argument{}, got {}",
                    fn_name,
                    arity,
                    if arity == 1 { "" } else { "s" },
                    got
                )));
            }
            let args = cx.args();
            let result = f(&args)?;
            cx.push(result);
            Ok(1)
        });
    }

    /// Register a variadic host function.
    pub fn register_variadic<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, HostFnError> + Send + Sync + 'static,
    {
        translate::register_host_fn(&mut self.engine, name, move |cx| {
            let args = cx.args();
            let result = f(&args)?;
            cx.push(result);
            Ok(1)
        });
    }

    /// Register a host function on the full calling convention: read
    /// arguments through the context, push any number of results, return
    /// the count.
    pub fn register_raw<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut HostContext) -> Result<usize, HostFnError> + Send + Sync + 'static,
    {
        translate::register_host_fn(&mut self.engine, name, f);
    }

    // ==================== Calls ====================

    /// Invoke the named global function with `args`, returning its results
    /// or the translated error.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>, BridgeError> {
        let span = tracing::debug_span!(target: "causeway::session", "call", function = name);
        let _enter = span.enter();

        let func = self
            .engine
            .global(name)
            .ok_or_else(|| BridgeError::UnknownFunction {
                name: name.to_string(),
            })?;
        self.engine.reserve(args.len() + 1)?;

        let base = self.engine.depth();
        self.engine.push(func);
        for arg in args {
            self.engine.push(arg.clone());
        }
        gate::protected_call(&mut self.engine, args.len(), ResultMode::All)?;

        let produced = self.engine.depth() - base;
        let mut results = Vec::with_capacity(produced);
        for _ in 0..produced {
            results.push(self.engine.pop()?);
        }
        results.reverse();
        Ok(results)
    }

    /// Dispatch one boundary operation under the session's wrap policy,
    /// translating an ERROR status immediately.
    pub fn apply(&mut self, op: &BoundaryOp) -> Result<(), BridgeError> {
        match checked::dispatch(&mut self.engine, op, self.config.wrap_policy)? {
            CallStatus::Ok => Ok(()),
            CallStatus::Error => Err(translate::error_after_wrapped(&mut self.engine)),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Release: drop everything still on the instance's stack.
        self.engine.truncate(0);
        tracing::debug!(target: "causeway::session", "session released");
    }
}
