//! Error types for the party layer.

use partyline_protocol::RpcError;
use partyline_transport::TransportError;

use crate::SessionState;

/// Errors returned by [`PartySession`](crate::PartySession) operations.
#[derive(Debug, thiserror::Error)]
pub enum PartyError {
    /// The connection could not be set up.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server sent a push the session could not accept.
    #[error(transparent)]
    Protocol(#[from] PushError),

    /// The operation is not allowed in the session's current state,
    /// e.g. opening a session that was already opened once.
    #[error("invalid session state: {0:?}")]
    InvalidState(SessionState),
}

/// A push from the server that breaks the party protocol.
///
/// Reported to [`PartyListener::on_protocol_error`](crate::PartyListener::on_protocol_error)
/// and answered with `-32602 Invalid params`. A push that fails to decode
/// never touches the session's cached state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PushError {
    /// `message_type` is not one the session knows.
    #[error("unknown message type {0:?}")]
    UnknownMessageType(String),

    /// A required field is absent or `null`.
    #[error("{message_type}: missing required field {field:?}")]
    MissingField {
        message_type: String,
        field: &'static str,
    },

    /// The payload is present but has the wrong shape.
    #[error("{message_type}: malformed payload: {reason}")]
    Malformed {
        message_type: String,
        reason: String,
    },
}

impl PushError {
    pub(crate) fn missing(message_type: &str, field: &'static str) -> Self {
        Self::MissingField {
            message_type: message_type.to_owned(),
            field,
        }
    }

    pub(crate) fn malformed(message_type: &str, reason: impl ToString) -> Self {
        Self::Malformed {
            message_type: message_type.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// The error sent back to the server when the push arrived as a request.
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError::invalid_params(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = PushError::missing("game_started", "location");
        assert_eq!(
            err.to_string(),
            r#"game_started: missing required field "location""#
        );
    }

    #[test]
    fn test_to_rpc_error_carries_reason() {
        let err = PushError::UnknownMessageType("dance".into());
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, -32602);
        assert_eq!(rpc.data, Some(serde_json::json!(r#"unknown message type "dance""#)));
    }

    #[test]
    fn test_party_error_from_push_error() {
        let err: PartyError = PushError::UnknownMessageType("x".into()).into();
        assert!(matches!(err, PartyError::Protocol(_)));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = PartyError::InvalidState(SessionState::Closed);
        assert_eq!(err.to_string(), "invalid session state: Closed");
    }
}
