//! Error types for the protocol layer.
//!
//! Decoding can fail in two distinguishable ways, and the difference
//! matters on the wire: bytes that are not JSON at all get a `-32700`
//! reply, while JSON that is not a valid envelope gets `-32600`.

use crate::{RequestId, RpcError};

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// The frame is JSON, but not a well-formed JSON-RPC 2.0 envelope.
    ///
    /// `id` is kept when the frame had a usable one, so the error reply
    /// can still be attributed to the offending request.
    #[error("invalid envelope: {reason}")]
    InvalidEnvelope {
        id: Option<RequestId>,
        reason: String,
    },

    /// Serialization of an outgoing envelope failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    pub(crate) fn invalid(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        Self::InvalidEnvelope {
            id,
            reason: reason.into(),
        }
    }

    /// Converts a decode failure into the error reply owed to the peer.
    ///
    /// Returns `None` for [`ProtocolError::Encode`], which is a local
    /// failure with nothing to report back.
    pub fn to_reply(&self) -> Option<(Option<RequestId>, RpcError)> {
        match self {
            Self::Parse(_) => Some((None, RpcError::parse_error())),
            Self::InvalidEnvelope { id, reason } => {
                Some((id.clone(), RpcError::invalid_request(reason.clone())))
            }
            Self::Encode(_) => None,
        }
    }
}
