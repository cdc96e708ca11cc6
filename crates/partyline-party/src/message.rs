//! Decoding server pushes.
//!
//! The server pushes two methods at a party session:
//!
//! - `"message"`: `{"message_type": <string>, "payload": <any>}`. The
//!   message type selects a [`MessageKind`]; the payload is then decoded
//!   into the matching [`PushMessage`] variant.
//! - `"party"`: `{"party": {...}, "members": [...]}`, a full roster
//!   snapshot decoded into a [`RosterSnapshot`].
//!
//! Decoding fails closed. A payload missing a required field becomes a
//! [`PushError`] and is never turned into a half-filled value.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{GameStarted, Party, PartyMember, PushError};

/// Push method carrying typed messages.
pub(crate) const MESSAGE_METHOD: &str = "message";

/// Push method carrying roster snapshots.
pub(crate) const PARTY_METHOD: &str = "party";

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Every `message_type` a party session understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    PlayerJoined,
    PlayerLeft,
    GameStarting,
    GameStartFailed,
    GameStarted,
    Custom,
    PartyClosed,
}

impl MessageKind {
    /// All kinds, in wire-table order.
    pub const ALL: [MessageKind; 7] = [
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::GameStarting,
        Self::GameStartFailed,
        Self::GameStarted,
        Self::Custom,
        Self::PartyClosed,
    ];

    /// The `message_type` string used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerJoined => "player_joined",
            Self::PlayerLeft => "player_left",
            Self::GameStarting => "game_starting",
            Self::GameStartFailed => "game_start_failed",
            Self::GameStarted => "game_started",
            Self::Custom => "custom",
            Self::PartyClosed => "party_closed",
        }
    }

    /// Fields that must be present and non-null in this kind's payload.
    /// Kinds with an opaque payload have none.
    fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::PlayerJoined | Self::PlayerLeft => &["account", "role"],
            Self::GameStartFailed => &["code", "reason"],
            Self::GameStarted => &["id", "key", "location", "settings"],
            Self::GameStarting | Self::Custom | Self::PartyClosed => &[],
        }
    }
}

impl FromStr for MessageKind {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PushError::UnknownMessageType(s.to_owned()))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PushMessage
// ---------------------------------------------------------------------------

/// A decoded `"message"` push.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    PlayerJoined(PartyMember),
    PlayerLeft(PartyMember),
    /// The game is being prepared. Payload is forwarded as sent.
    GameStarting(Value),
    GameStartFailed { code: i64, reason: String },
    GameStarted(GameStarted),
    /// A message another member sent with `send_message`.
    Custom(Value),
    /// The party was closed. Payload is whatever the closer attached.
    PartyClosed(Value),
}

#[derive(Deserialize)]
struct StartFailure {
    code: i64,
    reason: String,
}

impl PushMessage {
    /// Decodes the params of a `"message"` push.
    ///
    /// # Errors
    /// - [`PushError::UnknownMessageType`] for a `message_type` outside
    ///   [`MessageKind::ALL`].
    /// - [`PushError::MissingField`] when `message_type` or a required
    ///   payload field is absent or `null`.
    /// - [`PushError::Malformed`] when anything has the wrong type.
    pub fn decode(params: Option<Value>) -> Result<Self, PushError> {
        let Some(Value::Object(mut envelope)) = params else {
            return Err(PushError::malformed(MESSAGE_METHOD, "params must be an object"));
        };

        let kind: MessageKind = match envelope.remove("message_type") {
            Some(Value::String(name)) => name.parse()?,
            None | Some(Value::Null) => {
                return Err(PushError::missing(MESSAGE_METHOD, "message_type"));
            }
            Some(other) => {
                return Err(PushError::malformed(
                    MESSAGE_METHOD,
                    format!("message_type must be a string, got {other}"),
                ));
            }
        };
        let payload = envelope.remove("payload").unwrap_or(Value::Null);

        Ok(match kind {
            MessageKind::PlayerJoined => Self::PlayerJoined(typed(kind, payload)?),
            MessageKind::PlayerLeft => Self::PlayerLeft(typed(kind, payload)?),
            MessageKind::GameStarting => Self::GameStarting(payload),
            MessageKind::GameStartFailed => {
                let StartFailure { code, reason } = typed(kind, payload)?;
                Self::GameStartFailed { code, reason }
            }
            MessageKind::GameStarted => Self::GameStarted(typed(kind, payload)?),
            MessageKind::Custom => Self::Custom(payload),
            MessageKind::PartyClosed => Self::PartyClosed(payload),
        })
    }

    /// Which kind of message this is.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::PlayerJoined(_) => MessageKind::PlayerJoined,
            Self::PlayerLeft(_) => MessageKind::PlayerLeft,
            Self::GameStarting(_) => MessageKind::GameStarting,
            Self::GameStartFailed { .. } => MessageKind::GameStartFailed,
            Self::GameStarted(_) => MessageKind::GameStarted,
            Self::Custom(_) => MessageKind::Custom,
            Self::PartyClosed(_) => MessageKind::PartyClosed,
        }
    }
}

/// Checks `kind`'s required fields, then deserializes the payload.
fn typed<T: DeserializeOwned>(kind: MessageKind, payload: Value) -> Result<T, PushError> {
    let name = kind.as_str();
    let Value::Object(fields) = &payload else {
        return Err(if payload.is_null() {
            PushError::missing(name, "payload")
        } else {
            PushError::malformed(name, "payload must be an object")
        });
    };

    if let Some(field) = kind
        .required_fields()
        .iter()
        .copied()
        .find(|field| fields.get(*field).is_none_or(Value::is_null))
    {
        return Err(PushError::missing(name, field));
    }

    serde_json::from_value(payload).map_err(|e| PushError::malformed(name, e))
}

// ---------------------------------------------------------------------------
// RosterSnapshot
// ---------------------------------------------------------------------------

/// A decoded `"party"` push: the whole roster at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSnapshot {
    pub party: Party,
    pub members: Vec<PartyMember>,
    /// How many entries of the `members` array were malformed and left out.
    pub skipped: usize,
}

impl RosterSnapshot {
    /// Decodes the params of a `"party"` push.
    ///
    /// The `party` object must decode for the snapshot to be accepted.
    /// Entries of `members` that do not decode are skipped one by one.
    pub fn decode(params: Option<Value>) -> Result<Self, PushError> {
        let Some(Value::Object(mut envelope)) = params else {
            return Err(PushError::malformed(PARTY_METHOD, "params must be an object"));
        };

        let party: Party = match envelope.remove("party") {
            None | Some(Value::Null) => return Err(PushError::missing(PARTY_METHOD, "party")),
            Some(value) => {
                serde_json::from_value(value).map_err(|e| PushError::malformed(PARTY_METHOD, e))?
            }
        };

        let entries = match envelope.remove("members") {
            Some(Value::Array(entries)) => entries,
            None | Some(Value::Null) => return Err(PushError::missing(PARTY_METHOD, "members")),
            Some(_) => {
                return Err(PushError::malformed(PARTY_METHOD, "members must be an array"));
            }
        };

        let total = entries.len();
        let members: Vec<PartyMember> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(member) => Some(member),
                Err(e) => {
                    tracing::warn!(party_id = %party.id, index, error = %e, "skipping malformed party member");
                    None
                }
            })
            .collect();

        Ok(Self {
            skipped: total - members.len(),
            party,
            members,
        })
    }
}
