//! Unified error type for Partyline.

use partyline_party::{PartyError, PushError};
use partyline_protocol::{ProtocolError, RpcError};
use partyline_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `partyline` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PartylineError {
    /// The client was built with missing or unusable settings.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// A transport-level error (location, connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer answered a call with an error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A party session operation failed.
    #[error(transparent)]
    Party(#[from] PartyError),

    /// The server pushed a message that breaks the party protocol.
    #[error(transparent)]
    Push(#[from] PushError),
}
