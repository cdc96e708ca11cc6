//! Transport layer for Partyline.
//!
//! Provides the [`Connection`] trait that abstracts over a message-oriented
//! duplex socket, a WebSocket client implementation, and [`RpcConnection`],
//! the adapter that binds one [`RpcEngine`](partyline_rpc::RpcEngine) to one
//! connection for the connection's whole lifetime.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`
//! - `rustls`: `wss://` support through rustls with webpki roots

mod adapter;
mod error;
mod location;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use adapter::{ConnectionConfig, ConnectionObserver, RpcConnection};
pub use error::TransportError;
pub use location::build_location;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Close status code for a normal, intentional close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close status code used when the connection ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// How and why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket-style status code.
    pub code: u16,
    /// Human-readable reason. May be empty.
    pub reason: String,
    /// `true` when the peer (or the network) ended the connection,
    /// `false` when we closed it ourselves.
    pub remote: bool,
}

impl CloseInfo {
    /// A close initiated by the remote side.
    pub fn remote(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            remote: true,
        }
    }

    /// A close initiated locally.
    pub fn local(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            remote: false,
        }
    }
}

/// What a [`Connection`] yields when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// One complete message frame.
    Frame(Vec<u8>),
    /// The connection is over. No further reads will succeed.
    Closed(CloseInfo),
}

/// A single message-oriented duplex connection.
///
/// The methods return `Send` futures so a connection can be driven from a
/// spawned task regardless of its concrete type. Implementations may still
/// use `async fn` in the `impl` block.
pub trait Connection: Send + Sync + 'static {
    /// Sends one message frame to the peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message frame, or the close that ended the
    /// connection.
    ///
    /// Must be cancel-safe: the driver races it against outbound frames.
    fn recv(&self) -> impl Future<Output = Result<Incoming, TransportError>> + Send;

    /// Starts a close handshake with the given status code and reason.
    fn close(
        &self,
        code: u16,
        reason: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
