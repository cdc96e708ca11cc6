//! Core types for the JSON-RPC 2.0 wire format.
//!
//! Every frame exchanged with the party service is one JSON-RPC envelope.
//! This module defines the in-memory shape of those envelopes; the
//! [`codec`](crate::JsonRpcCodec) turns them into bytes and back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The only protocol version this crate speaks. Every envelope carries it
/// in its `"jsonrpc"` member.
pub const JSONRPC_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Identifier correlating a request with its response.
///
/// Our own outgoing requests always use [`RequestId::Number`]. A peer is
/// allowed to use strings for the requests it sends us, so we accept both
/// and echo whatever we received.
///
/// `#[serde(untagged)]` means the JSON is just `7` or `"abc"`, with no
/// wrapping object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id. The engine's id sequence produces these.
    Number(u64),
    /// String id, only ever received from a peer.
    String(String),
}

impl RequestId {
    /// Returns the numeric value, if this is a numeric id.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "\"{s}\""),
        }
    }
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Error codes this crate produces on its own.
///
/// The first five are the standard JSON-RPC codes. The last two live in
/// the implementation-defined range and are only ever delivered locally,
/// to response handlers whose call could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// A pending call outlived its deadline.
    RequestTimeout,
    /// The connection closed while the call was still pending.
    ConnectionClosed,
}

impl ErrorCode {
    /// The numeric code placed in `error.code`.
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::RequestTimeout => -32001,
            Self::ConnectionClosed => -32002,
        }
    }

    /// The canonical message placed in `error.message`.
    pub fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::RequestTimeout => "Request timed out",
            Self::ConnectionClosed => "Connection closed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

// ---------------------------------------------------------------------------
// RpcError
// ---------------------------------------------------------------------------

/// The `error` member of an error response.
///
/// This is also the error type method handlers return. It derives
/// `thiserror::Error`, so a handler can build one and bubble it up with `?`;
/// the engine then sends the code and message to the peer unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    /// Standard or application-defined error code.
    pub code: i64,
    /// Short human-readable description.
    pub message: String,
    /// Optional extra detail. Omitted from JSON when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Creates an error with an application-defined code.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches a `data` member.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Builds an error from one of the well-known codes.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code.code(), code.message())
    }

    pub fn parse_error() -> Self {
        Self::from_code(ErrorCode::ParseError)
    }

    /// `-32600`, with the reason in `data`.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::InvalidRequest).with_data(reason.into())
    }

    pub fn method_not_found() -> Self {
        Self::from_code(ErrorCode::MethodNotFound)
    }

    /// `-32602`, with the reason in `data`.
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::InvalidParams).with_data(reason.into())
    }

    pub fn internal_error() -> Self {
        Self::from_code(ErrorCode::InternalError)
    }

    pub fn request_timeout() -> Self {
        Self::from_code(ErrorCode::RequestTimeout)
    }

    pub fn connection_closed() -> Self {
        Self::from_code(ErrorCode::ConnectionClosed)
    }
}

// ---------------------------------------------------------------------------
// RpcMessage
// ---------------------------------------------------------------------------

/// One decoded JSON-RPC envelope.
///
/// Which variant a frame becomes depends only on which members it carries:
///
/// ```text
/// id + method           → Request
/// method                → Notification
/// id + result           → Success
/// id? + error           → Error   (no id: framing-level error)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    /// Expects exactly one response carrying the same id.
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },

    /// Fire-and-forget. Nothing is ever sent back.
    Notification {
        method: String,
        params: Option<Value>,
    },

    /// A successful response.
    Success { id: RequestId, result: Value },

    /// An error response. `id` is `None` only when the error is about a
    /// frame the peer could not attribute to any request.
    Error {
        id: Option<RequestId>,
        error: RpcError,
    },
}

impl RpcMessage {
    /// The id carried by this envelope, if any.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { id, .. } | Self::Success { id, .. } => Some(id),
            Self::Error { id, .. } => id.as_ref(),
            Self::Notification { .. } => None,
        }
    }

    /// The method name, for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => {
                Some(method)
            }
            _ => None,
        }
    }
}
