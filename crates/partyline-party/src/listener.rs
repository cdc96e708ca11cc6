use partyline_transport::TransportError;
use serde_json::Value;

use crate::{GameStarted, Party, PartyMember, PushError};

/// Receives everything that happens to a [`PartySession`](crate::PartySession).
///
/// Every method has an empty default, so implement only what you need.
/// Callbacks run on the connection's driver task: keep them short, and hand
/// long work off to another task. A callback may call back into the session
/// (for example, `join` from `on_open`).
///
/// Lifecycle order for one session: at most one `on_open`, then any number
/// of push callbacks, then exactly one `on_close`. `on_error` may come
/// before `on_close` when the transport fails.
#[allow(unused_variables)]
pub trait PartyListener: Send + Sync + 'static {
    /// The session is open; operations can now be dispatched.
    fn on_open(&self) {}

    /// The session is closed for good. `remote` is `false` when this side
    /// closed it.
    fn on_close(&self, code: u16, reason: &str, remote: bool) {}

    /// The transport failed. `on_close` follows.
    fn on_error(&self, error: &TransportError) {}

    /// A full roster snapshot arrived and replaced the cached one.
    fn on_party_info_received(&self, party: &Party, members: &[PartyMember]) {}

    fn on_player_joined(&self, member: &PartyMember) {}

    fn on_player_left(&self, member: &PartyMember) {}

    fn on_game_starting(&self, payload: &Value) {}

    fn on_game_start_failed(&self, code: i64, reason: &str) {}

    fn on_game_started(&self, game: &GameStarted) {}

    fn on_party_closed(&self, payload: &Value) {}

    fn on_custom_message(&self, payload: &Value) {}

    /// The server pushed something the session could not accept. Nothing
    /// was applied from it.
    fn on_protocol_error(&self, error: &PushError) {}
}
