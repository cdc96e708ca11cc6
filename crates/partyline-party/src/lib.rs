//! Party session protocol for Partyline.
//!
//! A party is a matchmaking group of players that coordinate before they
//! enter a game room together. This crate drives one party session over one
//! connection:
//!
//! 1. **Opening**: building the session URI from a [`SessionPath`] and
//!    [`PartyOptions`], then connecting ([`PartySession::open`])
//! 2. **Pushes**: decoding what the server sends (`party` roster snapshots
//!    and typed `message` pushes) and handing them to a [`PartyListener`]
//! 3. **Operations**: joining, leaving, custom messages, closing the party,
//!    and starting the game
//!
//! # How it fits in the stack
//!
//! ```text
//! Your game client (above)  ← implements PartyListener
//!     ↕
//! Party Layer (this crate)  ← session state machine, push decoding
//!     ↕
//! Transport Layer (below)   ← RpcConnection: engine + socket
//! ```

mod error;
mod listener;
mod message;
mod model;
mod options;
mod session;

pub use error::{PartyError, PushError};
pub use listener::PartyListener;
pub use message::{MessageKind, PushMessage, RosterSnapshot};
pub use model::{GameLocation, GameStarted, Party, PartyMember};
pub use options::{ACCESS_TOKEN_KEY, PartyOptions, SessionPath};
pub use session::{PartySession, SessionState};
