/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The base location could not be turned into a socket URI.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// The socket handshake failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// `open` was called on a connection that was already started.
    #[error("connection already started")]
    AlreadyStarted,

    /// No Tokio runtime is available to drive the connection.
    #[error("no async runtime: {0}")]
    NoRuntime(String),
}
