//! # Partyline
//!
//! Client SDK for real-time party sessions on a game backend.
//!
//! A party is a group of players coordinating before a game: they join,
//! chat, and start a game together. Partyline keeps one persistent
//! connection per party session and speaks JSON-RPC 2.0 over it in both
//! directions: the client calls `join_party`, `start_game`, ...; the server
//! pushes roster snapshots and typed messages back.
//!
//! ## Layers
//!
//! ```text
//! partyline-party      ← PartySession, PartyListener, push decoding
//!     ↕
//! partyline-transport  ← RpcConnection, WebSocket client, URI building
//!     ↕
//! partyline-rpc        ← RpcEngine: ids, pending calls, method handlers
//!     ↕
//! partyline-protocol   ← JSON-RPC 2.0 envelopes and codec
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use partyline::prelude::*;
//!
//! struct Lobby;
//!
//! impl PartyListener for Lobby {
//!     fn on_player_joined(&self, member: &PartyMember) {
//!         println!("{} joined", member.account);
//!     }
//! }
//!
//! # async fn run() -> Result<(), PartylineError> {
//! let client = PartyClient::builder()
//!     .location("https://party.example.com")
//!     .token("bearer-token")
//!     .build()?;
//!
//! let session = client.open(
//!     &SessionPath::Connect { party_id: "42".into() },
//!     &PartyOptions::default().with_auto_join(true),
//!     Arc::new(Lobby),
//! )?;
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{PartyClient, PartyClientBuilder};
pub use error::PartylineError;

pub use partyline_party as party;
pub use partyline_protocol as protocol;
pub use partyline_rpc as rpc;
pub use partyline_transport as transport;

/// Everything a typical party client needs.
pub mod prelude {
    pub use crate::{PartyClient, PartyClientBuilder, PartylineError};
    pub use partyline_party::{
        GameLocation, GameStarted, Party, PartyError, PartyListener, PartyMember, PartyOptions,
        PartySession, PushError, SessionPath, SessionState,
    };
    pub use partyline_protocol::RpcError;
    pub use partyline_rpc::EngineConfig;
    pub use partyline_transport::{ConnectionConfig, TransportError};
}
