//! The seams between the engine and its neighbours.
//!
//! - [`FrameSink`]: where outgoing frames go (implemented by the transport).
//! - [`MethodHandler`]: what runs when the peer calls one of our methods
//!   (implemented by the party layer, or any closure).
//! - [`ResponseCallback`]: what runs when one of our calls completes.

use partyline_protocol::RpcError;
use serde_json::Value;

/// Receives encoded frames from the engine.
///
/// `send_frame` must not block: the engine calls it while holding its
/// pending-call lock, so implementations queue the frame (e.g. on a
/// channel) and write it to the socket elsewhere.
pub trait FrameSink: Send + Sync + 'static {
    /// Queues one frame for delivery.
    ///
    /// Returns `false` when the frame was not accepted, typically because
    /// the connection is not open. This is a normal outcome, not an error.
    fn send_frame(&self, frame: Vec<u8>) -> bool;

    /// Whether frames handed to [`send_frame`](Self::send_frame) can
    /// currently be delivered.
    fn is_open(&self) -> bool;
}

/// Handles calls and notifications the peer sends for one method name.
///
/// For a request, the return value becomes the response:
///
/// - `Ok(Some(value))` → `{"result": value}`
/// - `Ok(None)` or `Ok(Some(Value::Null))` → `-32603 Internal error`
///   (a response must carry a non-null result)
/// - `Err(e)` → `{"error": e}`, code and message passed through unchanged
///
/// For a notification the return value is ignored: there is no id to
/// answer and no one to tell.
///
/// Any `Fn(Option<Value>) -> Result<Option<Value>, RpcError>` closure is a
/// handler:
///
/// ```rust
/// use partyline_rpc::MethodHandler;
/// use partyline_protocol::RpcError;
/// use serde_json::{json, Value};
///
/// let echo = |params: Option<Value>| -> Result<Option<Value>, RpcError> {
///     Ok(Some(params.unwrap_or(json!(null))))
/// };
/// assert_eq!(echo.handle(Some(json!([1]))).unwrap(), Some(json!([1])));
/// ```
pub trait MethodHandler: Send + Sync + 'static {
    fn handle(&self, params: Option<Value>) -> Result<Option<Value>, RpcError>;
}

impl<F> MethodHandler for F
where
    F: Fn(Option<Value>) -> Result<Option<Value>, RpcError> + Send + Sync + 'static,
{
    fn handle(&self, params: Option<Value>) -> Result<Option<Value>, RpcError> {
        self(params)
    }
}

/// Completion callback for an outbound call. Invoked at most once, with
/// the peer's result or error, or with a locally generated timeout or
/// connection-closed error.
pub type ResponseCallback = Box<dyn FnOnce(Result<Value, RpcError>) + Send + 'static>;
