//! The engine: id sequence, pending-call table, handler registry, routing.
//!
//! # Concurrency
//!
//! The transport's receive loop and the caller's outbound calls may run on
//! different threads, so the pending table and the handler registry each
//! sit behind a lock. The locks are only held for table bookkeeping and
//! for queueing a frame on the sink. Response callbacks and method
//! handlers always run after the lock is released, which means a callback
//! may itself issue new calls on the same engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use partyline_protocol::{JsonRpcCodec, RequestId, RpcError, RpcMessage};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::{EngineConfig, FrameSink, MethodHandler, ResponseCallback};

/// Bookkeeping for one outbound request awaiting its response.
struct PendingCall {
    id: u64,
    created_at: Instant,
    on_response: ResponseCallback,
}

/// State guarded by the engine's main lock.
struct CallTable {
    /// The id the next request will use. Starts at 1 and only grows.
    next_id: u64,
    /// Outstanding calls, ordered by id so sweeps fail the oldest first.
    pending: BTreeMap<u64, PendingCall>,
}

/// A bidirectional JSON-RPC 2.0 engine bound to one [`FrameSink`].
///
/// ## Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use partyline_rpc::{EngineConfig, FrameSink, RpcEngine};
/// use serde_json::json;
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<Vec<u8>>>);
///
/// impl FrameSink for Recorder {
///     fn send_frame(&self, frame: Vec<u8>) -> bool {
///         self.0.lock().unwrap().push(frame);
///         true
///     }
///     fn is_open(&self) -> bool {
///         true
///     }
/// }
///
/// let sink = Arc::new(Recorder::default());
/// let engine = RpcEngine::new(sink.clone(), EngineConfig::default());
///
/// let id = engine.call("echo", Some(json!({"a": 1})), |res| {
///     assert_eq!(res.unwrap(), json!(42));
/// });
/// assert_eq!(id, Some(1));
///
/// engine.on_frame_received(br#"{"jsonrpc":"2.0","id":1,"result":42}"#);
/// assert_eq!(engine.pending_count(), 0);
/// ```
pub struct RpcEngine {
    codec: JsonRpcCodec,
    sink: Arc<dyn FrameSink>,
    config: EngineConfig,
    calls: Mutex<CallTable>,
    handlers: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl RpcEngine {
    /// Creates an engine that writes its frames to `sink`.
    pub fn new(sink: Arc<dyn FrameSink>, config: EngineConfig) -> Self {
        Self {
            codec: JsonRpcCodec,
            sink,
            config,
            calls: Mutex::new(CallTable {
                next_id: 1,
                pending: BTreeMap::new(),
            }),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the underlying sink can currently deliver frames.
    pub fn is_open(&self) -> bool {
        self.sink.is_open()
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.lock_calls().pending.len()
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    /// Sends a request and registers `on_response` to receive its outcome.
    ///
    /// Never blocks. Returns the assigned id when the frame was handed to
    /// the sink, or `None` when it was not (the sink is closed). In the
    /// `None` case no call is pending and `on_response` is dropped
    /// without being invoked.
    ///
    /// Ids are assigned in call order, are strictly increasing, and are
    /// only consumed once the sink reports it is open.
    pub fn call<F>(&self, method: &str, params: Option<Value>, on_response: F) -> Option<u64>
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        if !self.sink.is_open() {
            tracing::debug!(method, "call skipped, connection not open");
            return None;
        }

        let mut calls = self.lock_calls();
        let id = calls.next_id;
        calls.next_id += 1;

        let frame = match self
            .codec
            .encode_request(&RequestId::Number(id), method, params.as_ref())
        {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(id, method, error = %e, "failed to encode request");
                return None;
            }
        };

        calls.pending.insert(
            id,
            PendingCall {
                id,
                created_at: Instant::now(),
                on_response: Box::new(on_response),
            },
        );

        // Queued under the lock so frames leave in id order.
        if !self.sink.send_frame(frame) {
            calls.pending.remove(&id);
            tracing::debug!(id, method, "request not delivered, connection closed");
            return None;
        }

        tracing::debug!(id, method, "request sent");
        Some(id)
    }

    /// Like [`call`](Self::call), but delivers the outcome on a oneshot
    /// channel for callers that would rather `.await` it.
    ///
    /// If the connection closes first, the receiver yields the
    /// connection-closed error from the close-time sweep.
    pub fn call_async(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Option<oneshot::Receiver<Result<Value, RpcError>>> {
        let (tx, rx) = oneshot::channel();
        self.call(method, params, move |result| {
            // The receiver may have been dropped; that is the caller's choice.
            let _ = tx.send(result);
        })?;
        Some(rx)
    }

    /// Sends a notification. No id is consumed and nothing is tracked.
    ///
    /// Returns whether the frame was handed to the sink.
    pub fn notify(&self, method: &str, params: Option<Value>) -> bool {
        if !self.sink.is_open() {
            return false;
        }
        match self.codec.encode_notification(method, params.as_ref()) {
            Ok(frame) => self.sink.send_frame(frame),
            Err(e) => {
                tracing::error!(method, error = %e, "failed to encode notification");
                false
            }
        }
    }

    /// Registers the handler for inbound calls of `method`, replacing any
    /// previous one.
    pub fn register_handler(&self, method: impl Into<String>, handler: impl MethodHandler) {
        let method = method.into();
        let previous = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.clone(), Arc::new(handler));
        if previous.is_some() {
            tracing::debug!(method, "replaced method handler");
        }
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    /// Decodes and routes one inbound frame.
    ///
    /// Never fails: every problem with the frame is either answered with a
    /// standard error reply or logged and dropped. The engine stays usable
    /// for the next frame either way.
    pub fn on_frame_received(&self, data: &[u8]) {
        let message = match self.codec.decode(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting inbound frame");
                if let Some((id, error)) = e.to_reply() {
                    self.send_error(&error, id.as_ref());
                }
                return;
            }
        };

        match message {
            RpcMessage::Request { id, method, params } => {
                self.handle_request(id, &method, params);
            }
            RpcMessage::Notification { method, params } => {
                self.handle_notification(&method, params);
            }
            RpcMessage::Success { id, result } => self.complete(&id, Ok(result)),
            RpcMessage::Error { id: Some(id), error } => self.complete(&id, Err(error)),
            RpcMessage::Error { id: None, error } => {
                // Never answered: replying to an error could loop forever.
                tracing::warn!(
                    code = error.code,
                    message = %error.message,
                    "peer reported an error not tied to any request"
                );
            }
        }
    }

    fn handle_request(&self, id: RequestId, method: &str, params: Option<Value>) {
        let Some(handler) = self.handler(method) else {
            tracing::debug!(%id, method, "no handler for inbound request");
            self.send_error(&RpcError::method_not_found(), Some(&id));
            return;
        };

        match handler.handle(params) {
            Ok(None | Some(Value::Null)) => {
                tracing::warn!(%id, method, "handler produced no result");
                self.send_error(&RpcError::internal_error(), Some(&id));
            }
            Ok(Some(result)) => match self.codec.encode_result(&result, Some(&id)) {
                Ok(frame) => {
                    self.sink.send_frame(frame);
                }
                Err(e) => {
                    tracing::error!(%id, method, error = %e, "failed to encode result");
                    self.send_error(&RpcError::internal_error(), Some(&id));
                }
            },
            Err(error) => {
                tracing::debug!(%id, method, code = error.code, "handler returned an error");
                self.send_error(&error, Some(&id));
            }
        }
    }

    fn handle_notification(&self, method: &str, params: Option<Value>) {
        let Some(handler) = self.handler(method) else {
            tracing::debug!(method, "no handler for inbound notification");
            return;
        };
        if let Err(error) = handler.handle(params) {
            tracing::debug!(method, code = error.code, "notification handler failed");
        }
    }

    /// Resolves the pending call for `id`, if there is one.
    fn complete(&self, id: &RequestId, outcome: Result<Value, RpcError>) {
        let call = id
            .as_number()
            .and_then(|n| self.lock_calls().pending.remove(&n));

        match call {
            Some(call) => {
                tracing::debug!(
                    id = call.id,
                    ok = outcome.is_ok(),
                    elapsed_ms = call.created_at.elapsed().as_millis() as u64,
                    "call completed"
                );
                (call.on_response)(outcome);
            }
            None => {
                tracing::warn!(%id, "dropping response for unknown request id");
            }
        }
    }

    // -----------------------------------------------------------------
    // Hardening
    // -----------------------------------------------------------------

    /// Fails every pending call older than the configured timeout with
    /// `-32001 Request timed out`. Returns how many calls were failed.
    ///
    /// `now` is passed in so a driver can sweep on its own clock.
    pub fn expire_stale(&self, now: Instant) -> usize {
        let Some(timeout) = self.config.call_timeout else {
            return 0;
        };

        let expired: Vec<PendingCall> = {
            let mut calls = self.lock_calls();
            let ids: Vec<u64> = calls
                .pending
                .values()
                .filter(|call| now.saturating_duration_since(call.created_at) >= timeout)
                .map(|call| call.id)
                .collect();
            ids.iter()
                .filter_map(|id| calls.pending.remove(id))
                .collect()
        };

        let count = expired.len();
        for call in expired {
            tracing::debug!(id = call.id, "call timed out");
            (call.on_response)(Err(RpcError::request_timeout()));
        }
        count
    }

    /// Fails every pending call with `-32002 Connection closed`. Called by
    /// the transport once the connection is gone. Returns how many calls
    /// were failed.
    pub fn fail_all_pending(&self) -> usize {
        let drained = std::mem::take(&mut self.lock_calls().pending);
        let count = drained.len();
        if count > 0 {
            tracing::debug!(count, "failing pending calls, connection closed");
        }
        for call in drained.into_values() {
            (call.on_response)(Err(RpcError::connection_closed()));
        }
        count
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn handler(&self, method: &str) -> Option<Arc<dyn MethodHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned()
    }

    fn send_error(&self, error: &RpcError, id: Option<&RequestId>) {
        match self.codec.encode_error(error, id) {
            Ok(frame) => {
                self.sink.send_frame(frame);
            }
            Err(e) => tracing::error!(error = %e, "failed to encode error reply"),
        }
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, CallTable> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RpcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcEngine")
            .field("open", &self.is_open())
            .field("pending", &self.pending_count())
            .finish()
    }
}
