//! Engine instance and the low-level call surface
//!
//! One `Engine` owns one call stack, one callable registry, and one globals
//! table. Everything an embedder may do to an instance goes through the
//! surface defined here: stack primitives, registration, the native raise
//! primitive, and the native protected-call primitives.
//!
//! The engine signals errors with a non-local jump: `raise` unwinds the
//! native call stack until the nearest enclosing protected call catches it.
//! A raise that reaches a frame the embedder did not protect is a real
//! unwind through that frame — embedders are expected to confine raises
//! with `raw_protected_call` / `raw_protected_scope`.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::stack::Stack;
use crate::value::{FuncRef, Value};
use crate::EngineError;

/// Default ceiling on the value stack depth.
pub const DEFAULT_STACK_LIMIT: usize = 65_536;

/// Status of a protected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ok,
    Error,
}

/// How many results a call leaves on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// Adjust to exactly this many results (padding with `Null`).
    Exactly(usize),
    /// Keep every result the callee produced.
    All,
}

/// What a registered callable hands back to the engine.
///
/// Calling convention: the callable reads its arguments from the stack
/// (positive indices 1..=nargs), pushes its results, and returns how many it
/// pushed. To signal failure it leaves its error unit as the topmost values
/// of its frame and returns `Error { unit }`; the engine then raises that
/// unit from its own frame.
pub enum RawReturn {
    Results(usize),
    Error { unit: usize },
}

/// A callable registered with an engine instance.
pub type RawFn = Arc<dyn Fn(&mut Engine) -> RawReturn + Send + Sync>;

/// Outcome of a protected scope: the closure's value, or the caught raise.
#[derive(Debug)]
pub enum Protected<T> {
    Returned(T),
    Raised(Vec<Value>),
}

/// Payload of a native raise. Crate-private: only the engine's protected
/// primitives may catch and interpret it; any other panic payload is foreign
/// and is always rethrown.
pub(crate) struct RaiseUnit {
    pub(crate) values: Vec<Value>,
}

/// Arithmetic operations exposed on the call surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Mod => a % b,
        }
    }

    fn divides(self) -> bool {
        matches!(self, ArithOp::Div | ArithOp::Mod)
    }
}

struct Frame {
    /// 0-based slot of the frame's first positive index (argument 1).
    floor: usize,
    nargs: usize,
}

struct Registered {
    name: String,
    func: RawFn,
}

/// One interpreter instance: stack, frames, registry, globals.
pub struct Engine {
    stack: Stack,
    frames: Vec<Frame>,
    registry: Vec<Registered>,
    globals: HashMap<String, Value>,
    stack_limit: usize,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_stack_limit(DEFAULT_STACK_LIMIT)
    }

    pub fn with_stack_limit(stack_limit: usize) -> Self {
        Self {
            stack: Stack::new(),
            frames: Vec::new(),
            registry: Vec::new(),
            globals: HashMap::new(),
            stack_limit,
        }
    }

    // ==================== Stack primitives ====================

    /// Current stack depth (absolute, in slots).
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, EngineError> {
        self.stack.pop()
    }

    /// Drop every slot at or above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.stack.truncate(depth);
    }

    /// Ensure room for `extra` more slots under the configured limit.
    pub fn reserve(&mut self, extra: usize) -> Result<(), EngineError> {
        if self.stack.depth() + extra > self.stack_limit {
            return Err(EngineError::StackOverflow {
                limit: self.stack_limit,
            });
        }
        Ok(())
    }

    /// Read the slot at an acceptable index (positive 1-based from the
    /// current frame floor, negative from the top).
    pub fn value_at(&self, idx: i32) -> Result<&Value, EngineError> {
        let slot = self.stack.resolve(self.current_floor(), idx)?;
        self.stack
            .get(slot)
            .ok_or(EngineError::InvalidIndex { index: idx as i64 })
    }

    /// Overwrite the slot at an acceptable index.
    pub fn replace(&mut self, idx: i32, value: Value) -> Result<(), EngineError> {
        let slot = self.stack.resolve(self.current_floor(), idx)?;
        self.stack.set(slot, value)
    }

    /// Type name of the slot at an acceptable index.
    pub fn type_at(&self, idx: i32) -> Result<&'static str, EngineError> {
        Ok(self.value_at(idx)?.type_name())
    }

    /// Argument count of the currently executing callable (0 at host level).
    pub fn arg_count(&self) -> usize {
        self.frames.last().map(|f| f.nargs).unwrap_or(0)
    }

    fn current_floor(&self) -> usize {
        self.frames.last().map(|f| f.floor).unwrap_or(0)
    }

    // ==================== Globals and registration ====================

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Register a callable and bind it to a global of the same name.
    pub fn register(&mut self, name: impl Into<String>, func: RawFn) -> FuncRef {
        let name = name.into();
        let fref = FuncRef(self.registry.len());
        self.registry.push(Registered {
            name: name.clone(),
            func,
        });
        self.globals.insert(name, Value::Function(fref));
        fref
    }

    /// Registered name of a callable, for diagnostics.
    pub fn registered_name(&self, fref: FuncRef) -> Option<&str> {
        self.registry.get(fref.0).map(|r| r.name.as_str())
    }

    // ==================== Native raise ====================

    /// Raise a native error carrying `value`.
    ///
    /// Unwinds to the nearest enclosing protected call, which re-pushes the
    /// value at the catch point. Never returns.
    pub fn raise(&mut self, value: Value) -> ! {
        self.raise_unit(vec![value])
    }

    fn raise_unit(&mut self, values: Vec<Value>) -> ! {
        panic::panic_any(RaiseUnit { values })
    }

    fn raise_type_error(&mut self, action: &str, value: &Value) -> ! {
        let message = format!("attempt to {} a {} value", action, value.type_name());
        self.raise(Value::string(message))
    }

    // ==================== Failure-prone operations ====================
    //
    // These validate before consuming operands, so a raise always leaves the
    // stack at the depth it had on entry.

    /// Pop two operands, push the arithmetic result.
    ///
    /// Raises on a non-numeric operand and on division or modulo by zero.
    pub fn raw_arith(&mut self, op: ArithOp) -> Result<(), EngineError> {
        if self.stack.depth() < self.current_floor() + 2 {
            return Err(EngineError::StackUnderflow);
        }
        let b_val = self.stack.peek(0)?.clone();
        let a_val = self.stack.peek(1)?.clone();
        let a = match a_val.coerce_number() {
            Some(n) => n,
            None => self.raise_type_error("perform arithmetic on", &a_val),
        };
        let b = match b_val.coerce_number() {
            Some(n) => n,
            None => self.raise_type_error("perform arithmetic on", &b_val),
        };
        if op.divides() && b == 0.0 {
            self.raise(Value::string("division by zero"));
        }
        let result = op.apply(a, b);
        self.stack.pop_n(2)?;
        self.stack.push(Value::Number(result));
        Ok(())
    }

    /// Pop the top `n` values, push their concatenation.
    ///
    /// Raises on an operand that is neither a string nor a number.
    pub fn raw_concat(&mut self, n: usize) -> Result<(), EngineError> {
        if self.stack.depth() < self.current_floor() + n {
            return Err(EngineError::StackUnderflow);
        }
        for distance in 0..n {
            let value = self.stack.peek(distance)?.clone();
            if !value.is_concatenable() {
                self.raise_type_error("concatenate", &value);
            }
        }
        let parts = self.stack.pop_n(n)?;
        let mut out = String::new();
        for part in &parts {
            out.push_str(&part.to_string());
        }
        self.stack.push(Value::string(out));
        Ok(())
    }

    /// Push the named global.
    ///
    /// Raises when the name is not defined.
    pub fn raw_get_global(&mut self, name: &str) {
        match self.globals.get(name).cloned() {
            Some(value) => self.stack.push(value),
            None => {
                let message = format!("undefined global '{}'", name);
                self.raise(Value::string(message));
            }
        }
    }

    /// Replace the slot at `idx` with its numeric coercion.
    ///
    /// Raises when the value is not coercible to a number.
    pub fn raw_coerce_number(&mut self, idx: i32) -> Result<(), EngineError> {
        let value = self.value_at(idx)?.clone();
        match value.coerce_number() {
            Some(n) => self.replace(idx, Value::Number(n)),
            None => {
                let message = format!("cannot convert a {} value to a number", value.type_name());
                self.raise(Value::string(message))
            }
        }
    }

    // ==================== Calls ====================

    /// Call the function at `-(nargs + 1)` with the top `nargs` arguments,
    /// unprotected. A raise inside the callee unwinds through this frame.
    ///
    /// Stack: consumes the function and its arguments, leaves the results
    /// (adjusted per `mode`).
    pub fn raw_call(&mut self, nargs: usize, mode: ResultMode) -> Result<(), EngineError> {
        let depth = self.stack.depth();
        let floor = self.current_floor();
        if depth < floor + nargs + 1 {
            return Err(EngineError::StackUnderflow);
        }
        let func_slot = depth - nargs - 1;
        let callee = match self.stack.get(func_slot) {
            Some(Value::Function(fref)) => {
                let fref = *fref;
                match self.registry.get(fref.0) {
                    Some(registered) => Arc::clone(&registered.func),
                    None => return Err(EngineError::UnknownFunction { index: fref.0 }),
                }
            }
            Some(other) => {
                let other = other.clone();
                self.raise_type_error("call", &other)
            }
            None => return Err(EngineError::StackUnderflow),
        };

        self.frames.push(Frame {
            floor: func_slot + 1,
            nargs,
        });
        let produced = match callee(self) {
            RawReturn::Results(n) => n,
            RawReturn::Error { unit } => {
                let unit = unit.min(self.stack.depth());
                let values = self.stack.pop_n(unit)?;
                self.raise_unit(values)
            }
        };
        self.frames.pop();

        if self.stack.depth() < func_slot + produced {
            return Err(EngineError::ShortResults {
                declared: produced,
            });
        }
        self.stack.shift_down(func_slot, produced)?;
        if let ResultMode::Exactly(want) = mode {
            for _ in produced..want {
                self.stack.push(Value::Null);
            }
            self.stack.truncate(func_slot + want);
        }
        Ok(())
    }

    /// Protected form of `raw_call`: any raise originating inside the call
    /// terminates here. On error the function and arguments are gone and the
    /// raise unit sits on the stack in their place.
    pub fn raw_protected_call(
        &mut self,
        nargs: usize,
        mode: ResultMode,
    ) -> Result<CallStatus, EngineError> {
        let depth = self.stack.depth();
        if depth < self.current_floor() + nargs + 1 {
            return Err(EngineError::StackUnderflow);
        }
        let base = depth - nargs - 1;
        let saved_frames = self.frames.len();

        // The closure borrows self mutably; stack and frame depths saved
        // above are restored on every catch path, so the instance stays
        // coherent across the unwind.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.raw_call(nargs, mode)));
        match outcome {
            Ok(Ok(())) => Ok(CallStatus::Ok),
            Ok(Err(e)) => {
                self.frames.truncate(saved_frames);
                Err(e)
            }
            Err(payload) => match payload.downcast::<RaiseUnit>() {
                Ok(unit) => {
                    self.frames.truncate(saved_frames);
                    self.stack.truncate(base);
                    for value in unit.values {
                        self.stack.push(value);
                    }
                    Ok(CallStatus::Error)
                }
                Err(foreign) => panic::resume_unwind(foreign),
            },
        }
    }

    /// Run `f` inside a protected scope wholly contained in this call.
    ///
    /// A raise inside `f` is caught here and handed back as
    /// `Protected::Raised`; the stack is restored to at most its entry
    /// depth. Panics that are not engine raises are rethrown untouched.
    pub fn raw_protected_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Engine) -> Result<T, EngineError>,
    ) -> Result<Protected<T>, EngineError> {
        let saved_frames = self.frames.len();
        let saved_depth = self.stack.depth();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        match outcome {
            Ok(Ok(value)) => Ok(Protected::Returned(value)),
            Ok(Err(e)) => {
                self.frames.truncate(saved_frames);
                Err(e)
            }
            Err(payload) => match payload.downcast::<RaiseUnit>() {
                Ok(unit) => {
                    self.frames.truncate(saved_frames);
                    if self.stack.depth() > saved_depth {
                        self.stack.truncate(saved_depth);
                    }
                    Ok(Protected::Raised(unit.values))
                }
                Err(foreign) => panic::resume_unwind(foreign),
            },
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
