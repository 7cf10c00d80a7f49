//! Error channel: the on-stack wire format for boundary failures
//!
//! An error crossing the boundary travels as a pair of stack slots,
//! `[sentinel, message]` with the message on top. The sentinel is a
//! process-unique opaque token that ordinary VM code can neither construct
//! nor observe, so the pair cannot collide with legitimate results.
//!
//! The protocol is symmetric: wrapped native operations encode a pair when
//! they capture a raise, and the host-function glue encodes a pair before
//! handing the error status back to the engine. Decoding also accepts a
//! bare message value, which is how a raise originating in VM script code
//! arrives at a protected call.

use causeway_engine::{Engine, OpaqueToken, Value};
use once_cell::sync::Lazy;
use thiserror::Error;

static SENTINEL: Lazy<OpaqueToken> = Lazy::new(OpaqueToken::unique);

/// The sentinel token marking an error-channel pair.
pub fn sentinel() -> &'static OpaqueToken {
    &SENTINEL
}

/// Whether `value` is the error-channel sentinel.
pub fn is_sentinel(value: &Value) -> bool {
    matches!(value, Value::Token(token) if token == &*SENTINEL)
}

/// Malformed or missing error state on the stack. Reaching one of these
/// means the caller broke the decode-before-anything-else rule, not that
/// the VM failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no error value on the stack")]
    Empty,

    #[error("error sentinel present without a message")]
    MissingMessage,
}

/// The error being carried across the boundary: the raised message value,
/// preserved opaquely (strings stay strings, other values stay themselves).
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    pub message: Value,
}

impl ErrorPayload {
    pub fn new(message: Value) -> Self {
        Self { message }
    }

    /// The message rendered for display.
    pub fn text(&self) -> String {
        self.message.to_string()
    }
}

/// Push the pair `[sentinel, message]` onto the stack.
///
/// Stack: `+2` slots.
pub fn encode(engine: &mut Engine, payload: &ErrorPayload) {
    engine.push(Value::Token(SENTINEL.clone()));
    engine.push(payload.message.clone());
}

/// Whether the top of the stack currently holds a full error-channel pair.
pub fn pair_present(engine: &Engine) -> bool {
    match engine.value_at(-2) {
        Ok(value) => is_sentinel(value),
        Err(_) => false,
    }
}

/// Pop and return the pending error.
///
/// Accepts the full `[sentinel, message]` pair or a bare message value; in
/// either case the stack is left without any remnant of the error. Decoding
/// must happen before any other stack operation once an ERROR status has
/// been observed.
///
/// Stack: `-2` slots for a pair, `-1` for a bare message.
pub fn decode(engine: &mut Engine) -> Result<ErrorPayload, ChannelError> {
    if engine.depth() == 0 {
        return Err(ChannelError::Empty);
    }
    if pair_present(engine) {
        let message = engine.pop().map_err(|_| ChannelError::Empty)?;
        let _sentinel = engine.pop().map_err(|_| ChannelError::Empty)?;
        return Ok(ErrorPayload::new(message));
    }
    let top = engine.pop().map_err(|_| ChannelError::Empty)?;
    if is_sentinel(&top) {
        // A lone sentinel on top: the message slot is missing.
        return Err(ChannelError::MissingMessage);
    }
    Ok(ErrorPayload::new(top))
}
