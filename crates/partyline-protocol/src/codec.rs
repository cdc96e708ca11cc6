//! Encoding and decoding of JSON-RPC 2.0 envelopes.
//!
//! Encoding goes through small borrowed "frame" structs so the member
//! order on the wire is fixed (`jsonrpc` first, then `method`/`id`, then
//! the body) and nothing is cloned just to be serialized.
//!
//! Decoding cannot simply derive `Deserialize` for [`RpcMessage`]: a
//! malformed envelope must be reported with the right error code, and
//! with its `id` when it had one. So we parse into a `serde_json::Value`
//! first and classify the object by which members are present.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{JSONRPC_VERSION, ProtocolError, RequestId, RpcError, RpcMessage};

#[derive(Serialize)]
struct RequestFrame<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    id: &'a RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

#[derive(Serialize)]
struct NotificationFrame<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

#[derive(Serialize)]
struct SuccessFrame<'a> {
    jsonrpc: &'static str,
    id: Option<&'a RequestId>,
    result: &'a Value,
}

#[derive(Serialize)]
struct ErrorFrame<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
    error: &'a RpcError,
}

/// The JSON-RPC 2.0 codec. Stateless, so it is a unit struct that can be
/// copied freely into whatever needs it.
///
/// ```rust
/// use partyline_protocol::{JsonRpcCodec, RequestId, RpcMessage};
/// use serde_json::json;
///
/// let codec = JsonRpcCodec;
/// let bytes = codec
///     .encode_request(&RequestId::Number(1), "echo", Some(&json!({"a": 1})))
///     .unwrap();
/// assert_eq!(
///     bytes,
///     br#"{"jsonrpc":"2.0","method":"echo","id":1,"params":{"a":1}}"#.to_vec()
/// );
///
/// let decoded = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded.method(), Some("echo"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcCodec;

impl JsonRpcCodec {
    pub fn encode_request(
        &self,
        id: &RequestId,
        method: &str,
        params: Option<&Value>,
    ) -> Result<Vec<u8>, ProtocolError> {
        to_vec(&RequestFrame {
            jsonrpc: JSONRPC_VERSION,
            method,
            id,
            params,
        })
    }

    pub fn encode_notification(
        &self,
        method: &str,
        params: Option<&Value>,
    ) -> Result<Vec<u8>, ProtocolError> {
        to_vec(&NotificationFrame {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        })
    }

    /// Encodes an error response. Without an `id` the member is omitted
    /// entirely, which is how framing-level errors are sent.
    pub fn encode_error(
        &self,
        error: &RpcError,
        id: Option<&RequestId>,
    ) -> Result<Vec<u8>, ProtocolError> {
        to_vec(&ErrorFrame {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        })
    }

    /// Encodes a success response. A missing `id` is written as `null`.
    pub fn encode_result(
        &self,
        result: &Value,
        id: Option<&RequestId>,
    ) -> Result<Vec<u8>, ProtocolError> {
        to_vec(&SuccessFrame {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        })
    }

    /// Encodes any decoded message back into bytes.
    pub fn encode(&self, message: &RpcMessage) -> Result<Vec<u8>, ProtocolError> {
        match message {
            RpcMessage::Request { id, method, params } => {
                self.encode_request(id, method, params.as_ref())
            }
            RpcMessage::Notification { method, params } => {
                self.encode_notification(method, params.as_ref())
            }
            RpcMessage::Success { id, result } => self.encode_result(result, Some(id)),
            RpcMessage::Error { id, error } => self.encode_error(error, id.as_ref()),
        }
    }

    /// Decodes one frame.
    ///
    /// # Errors
    /// - [`ProtocolError::Parse`] if the bytes are not JSON.
    /// - [`ProtocolError::InvalidEnvelope`] if the JSON is not a valid
    ///   envelope: not an object, wrong `jsonrpc`, a non-string `method`,
    ///   scalar `params`, both or neither of `result`/`error`, a response
    ///   without an id.
    pub fn decode(&self, data: &[u8]) -> Result<RpcMessage, ProtocolError> {
        let value: Value = serde_json::from_slice(data).map_err(ProtocolError::Parse)?;

        let Value::Object(mut obj) = value else {
            return Err(ProtocolError::invalid(None, "envelope must be a JSON object"));
        };

        // The id is pulled out first so every later failure can carry it.
        let id = take_id(&mut obj)?;

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(_) => {
                return Err(ProtocolError::invalid(id, "jsonrpc must be \"2.0\""));
            }
            None => {
                return Err(ProtocolError::invalid(id, "missing jsonrpc member"));
            }
        }

        let method = match obj.remove("method") {
            None => None,
            Some(Value::String(m)) => Some(m),
            Some(_) => return Err(ProtocolError::invalid(id, "method must be a string")),
        };
        let result = obj.remove("result");
        let error = obj.remove("error");

        if let Some(method) = method {
            if result.is_some() || error.is_some() {
                return Err(ProtocolError::invalid(
                    id,
                    "a request cannot carry result or error",
                ));
            }
            let params = match obj.remove("params") {
                None | Some(Value::Null) => None,
                Some(p @ (Value::Object(_) | Value::Array(_))) => Some(p),
                Some(_) => {
                    return Err(ProtocolError::invalid(
                        id,
                        "params must be an object or array",
                    ));
                }
            };
            return Ok(match id {
                Some(id) => RpcMessage::Request { id, method, params },
                None => RpcMessage::Notification { method, params },
            });
        }

        match (result, error) {
            (Some(_), Some(_)) => Err(ProtocolError::invalid(
                id,
                "response carries both result and error",
            )),
            (None, None) => Err(ProtocolError::invalid(
                id,
                "envelope has no method, result or error",
            )),
            (Some(result), None) => match id {
                Some(id) => Ok(RpcMessage::Success { id, result }),
                None => Err(ProtocolError::invalid(None, "success response without id")),
            },
            (None, Some(error)) => match serde_json::from_value::<RpcError>(error) {
                Ok(error) => Ok(RpcMessage::Error { id, error }),
                Err(e) => Err(ProtocolError::invalid(
                    id,
                    format!("malformed error object: {e}"),
                )),
            },
        }
    }
}

fn to_vec<T: Serialize>(frame: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(frame).map_err(ProtocolError::Encode)
}

/// Removes and validates the `id` member. `null` counts as absent.
fn take_id(obj: &mut Map<String, Value>) -> Result<Option<RequestId>, ProtocolError> {
    match obj.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(RequestId::String(s))),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(n) => Ok(Some(RequestId::Number(n))),
            None => Err(ProtocolError::invalid(
                None,
                "id must be a non-negative integer or a string",
            )),
        },
        Some(_) => Err(ProtocolError::invalid(
            None,
            "id must be a non-negative integer or a string",
        )),
    }
}
