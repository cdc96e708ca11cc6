//! Application-level party data.
//!
//! These are immutable snapshots. The session never edits one in place: a
//! new `party` push replaces the cached [`Party`] and member list wholesale.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A party as last reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    /// How many members the party has right now.
    pub num_members: u32,
    /// How many members the party can hold.
    pub max_members: u32,
    /// Opaque settings the party was created with.
    #[serde(default)]
    pub settings: Value,
}

/// One member of a party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMember {
    /// The member's account id.
    pub account: String,
    /// Server-defined role. Higher roles may start the game or close the party.
    pub role: u32,
    /// Opaque profile the member joined with. `null` when none was sent.
    #[serde(default)]
    pub profile: Value,
}

/// Where the game server for a started game is listening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLocation {
    pub host: String,
    pub ports: Vec<u16>,
}

/// The room a party was placed into when its game started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStarted {
    /// Room id.
    pub id: String,
    /// This client's slot in the room, when the server assigned one.
    #[serde(default)]
    pub slot: Option<String>,
    /// Key the client presents to the game server.
    pub key: String,
    pub location: GameLocation,
    pub settings: Value,
}
