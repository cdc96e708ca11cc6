//! The party session: one connection, one listener, one state machine.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use partyline_protocol::RpcError;
use partyline_transport::{
    CloseInfo, Connection, ConnectionConfig, ConnectionObserver, RpcConnection, TransportError,
    build_location,
};
use serde_json::{Map, Value};

use crate::message::{MESSAGE_METHOD, PARTY_METHOD};
use crate::{
    ACCESS_TOKEN_KEY, Party, PartyError, PartyListener, PartyMember, PartyOptions, PushError,
    PushMessage, RosterSnapshot, SessionPath,
};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its life.
///
/// ```text
///   Idle ──(open)──→ Connecting ──(handshake)──→ Open
///    │                   │                        │
///    └───────(close)─────┴──(close / error)───────┴──→ Closed
/// ```
///
/// `Closed` is terminal. A session is opened at most once; to try again,
/// build a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not opened yet.
    Idle,
    /// Socket handshake in progress.
    Connecting,
    /// Handshake complete; operations are dispatched.
    Open,
    /// Closed locally, remotely, or by a transport failure.
    Closed,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Roster {
    party: Option<Party>,
    members: Vec<PartyMember>,
}

/// State reachable from the session handle, the push handlers, and the
/// connection observer.
struct Shared {
    state: Mutex<SessionState>,
    roster: RwLock<Roster>,
    listener: Arc<dyn PartyListener>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `to` if the session is currently in `from`.
    fn advance(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.lock_state();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn reject(&self, error: PushError) -> RpcError {
        tracing::warn!(error = %error, "rejecting push");
        self.listener.on_protocol_error(&error);
        error.to_rpc_error()
    }

    /// Handler for `"message"` pushes.
    fn on_message(&self, params: Option<Value>) -> Result<Option<Value>, RpcError> {
        let message = PushMessage::decode(params).map_err(|e| self.reject(e))?;
        tracing::debug!(kind = %message.kind(), "push received");

        let listener = &self.listener;
        match &message {
            PushMessage::PlayerJoined(member) => listener.on_player_joined(member),
            PushMessage::PlayerLeft(member) => listener.on_player_left(member),
            PushMessage::GameStarting(payload) => listener.on_game_starting(payload),
            PushMessage::GameStartFailed { code, reason } => {
                listener.on_game_start_failed(*code, reason);
            }
            PushMessage::GameStarted(game) => listener.on_game_started(game),
            PushMessage::Custom(payload) => listener.on_custom_message(payload),
            PushMessage::PartyClosed(payload) => listener.on_party_closed(payload),
        }
        Ok(Some(Value::Bool(true)))
    }

    /// Handler for `"party"` pushes.
    fn on_party(&self, params: Option<Value>) -> Result<Option<Value>, RpcError> {
        let snapshot = RosterSnapshot::decode(params).map_err(|e| self.reject(e))?;
        tracing::debug!(
            party_id = %snapshot.party.id,
            members = snapshot.members.len(),
            skipped = snapshot.skipped,
            "roster received"
        );

        {
            let mut roster = self.roster.write().unwrap_or_else(PoisonError::into_inner);
            roster.party = Some(snapshot.party.clone());
            roster.members = snapshot.members.clone();
        }
        self.listener
            .on_party_info_received(&snapshot.party, &snapshot.members);
        Ok(Some(Value::Bool(true)))
    }
}

/// Turns connection lifecycle events into session transitions.
struct SessionObserver(Arc<Shared>);

impl ConnectionObserver for SessionObserver {
    fn on_open(&self) {
        // A session closed while connecting stays closed.
        if self.0.advance(SessionState::Connecting, SessionState::Open) {
            tracing::info!("party session open");
            self.0.listener.on_open();
        }
    }

    fn on_close(&self, close: &CloseInfo) {
        *self.0.lock_state() = SessionState::Closed;
        tracing::info!(code = close.code, remote = close.remote, "party session closed");
        self.0
            .listener
            .on_close(close.code, &close.reason, close.remote);
    }

    fn on_error(&self, error: &TransportError) {
        self.0.listener.on_error(error);
    }
}

// ---------------------------------------------------------------------------
// PartySession
// ---------------------------------------------------------------------------

/// A client's session with one party.
///
/// Created [`Idle`](SessionState::Idle). [`open`](Self::open) connects;
/// once the listener's `on_open` fires, the operations (`join`, `leave`,
/// `send_custom_message`, `close_party`, `start_game`) are dispatched.
/// In any other state they return `false` and send nothing. Nothing is
/// queued for later.
///
/// Every operation takes a completion callback that receives the server's
/// result or error, or a local timeout/connection-closed error. It is
/// called at most once, and never when the operation returned `false`.
pub struct PartySession {
    shared: Arc<Shared>,
    connection: RpcConnection,
}

impl PartySession {
    /// Creates an idle session and registers its push handlers.
    pub fn new(listener: Arc<dyn PartyListener>, config: ConnectionConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::Idle),
            roster: RwLock::new(Roster::default()),
            listener,
        });

        let connection = RpcConnection::new(config);
        let engine = connection.engine();
        let handler = Arc::clone(&shared);
        engine.register_handler(MESSAGE_METHOD, move |params: Option<Value>| {
            handler.on_message(params)
        });
        let handler = Arc::clone(&shared);
        engine.register_handler(PARTY_METHOD, move |params: Option<Value>| {
            handler.on_party(params)
        });

        Self { shared, connection }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Connects to `path` under the service at `location`.
    ///
    /// `token` is sent as the `access_token` query parameter, followed by
    /// `options`. Returns once the connection attempt has started; the
    /// outcome arrives as `on_open` or `on_error` + `on_close`.
    ///
    /// # Errors
    /// - [`PartyError::InvalidState`] unless the session is `Idle`.
    /// - [`PartyError::Transport`] when `location` is not a usable URL or
    ///   no Tokio runtime is running. The session stays `Idle` for a bad
    ///   location and is `Closed` otherwise.
    pub fn open(
        &self,
        location: &str,
        token: &str,
        path: &SessionPath,
        options: &PartyOptions,
    ) -> Result<(), PartyError> {
        let query = std::iter::once((ACCESS_TOKEN_KEY.to_owned(), token.to_owned()))
            .chain(options.to_query());
        let url = build_location(location, &path.to_path(), query)?;
        tracing::info!(path = %path.to_path(), "opening party session");
        self.begin(move |connection, observer| connection.open(url, observer))
    }

    /// Like [`open`](Self::open), over a connection the caller provides.
    /// `connect` resolves once its handshake is done.
    pub fn start<C, F>(&self, connect: F) -> Result<(), PartyError>
    where
        C: Connection,
        F: Future<Output = Result<C, TransportError>> + Send + 'static,
    {
        self.begin(move |connection, observer| connection.start(connect, observer))
    }

    fn begin<L>(&self, launch: L) -> Result<(), PartyError>
    where
        L: FnOnce(&RpcConnection, Arc<dyn ConnectionObserver>) -> Result<(), TransportError>,
    {
        if !self
            .shared
            .advance(SessionState::Idle, SessionState::Connecting)
        {
            return Err(PartyError::InvalidState(self.state()));
        }

        let observer: Arc<dyn ConnectionObserver> =
            Arc::new(SessionObserver(Arc::clone(&self.shared)));
        if let Err(e) = launch(&self.connection, observer) {
            *self.shared.lock_state() = SessionState::Closed;
            return Err(e.into());
        }
        Ok(())
    }

    /// Closes the session from this side.
    ///
    /// The listener gets `on_close(code, reason, false)`. From `Idle` the
    /// session closes immediately without ever connecting. Returns `false`
    /// if the session was already closed.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        let previous = {
            let mut state = self.shared.lock_state();
            std::mem::replace(&mut *state, SessionState::Closed)
        };

        match previous {
            SessionState::Idle => {
                tracing::info!(code, "party session closed before opening");
                self.shared.listener.on_close(code, reason, false);
                true
            }
            SessionState::Connecting | SessionState::Open => self.connection.close(code, reason),
            SessionState::Closed => false,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.shared.lock_state()
    }

    /// Whether operations are currently dispatched.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open && self.connection.is_open()
    }

    // -----------------------------------------------------------------
    // Roster cache
    // -----------------------------------------------------------------

    /// The party from the last roster snapshot, if one has arrived.
    pub fn party(&self) -> Option<Party> {
        self.shared
            .roster
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .party
            .clone()
    }

    /// The members from the last roster snapshot. Empty before the first.
    ///
    /// `player_joined`/`player_left` pushes do not change this list; only
    /// the next snapshot does.
    pub fn members(&self) -> Vec<PartyMember> {
        self.shared
            .roster
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .clone()
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Joins the party with `profile`. `check_members`, when set, is a
    /// server-side condition every current member's profile must meet.
    pub fn join<F>(&self, profile: Value, check_members: Option<Value>, on_response: F) -> bool
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        let mut params = Map::new();
        params.insert("member_profile".into(), profile);
        if let Some(check) = check_members {
            params.insert("check_members".into(), check);
        }
        self.dispatch("join_party", Some(Value::Object(params)), on_response)
    }

    /// Leaves the party. The session stays open.
    pub fn leave<F>(&self, on_response: F) -> bool
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        self.dispatch("leave_party", None, on_response)
    }

    /// Sends `payload` to every other member as a `custom` push.
    pub fn send_custom_message<F>(&self, payload: Value, on_response: F) -> bool
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        self.dispatch("send_message", Some(single("payload", payload)), on_response)
    }

    /// Closes the party for everyone. `message` reaches the members in
    /// their `party_closed` push.
    pub fn close_party<F>(&self, message: Value, on_response: F) -> bool
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        self.dispatch("close_party", Some(single("message", message)), on_response)
    }

    /// Asks the server to start the game for the whole party.
    pub fn start_game<F>(&self, message: Value, on_response: F) -> bool
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        self.dispatch("start_game", Some(single("message", message)), on_response)
    }

    fn dispatch<F>(&self, method: &str, params: Option<Value>, on_response: F) -> bool
    where
        F: FnOnce(Result<Value, RpcError>) + Send + 'static,
    {
        if !self.is_open() {
            tracing::debug!(method, state = ?self.state(), "operation skipped, session not open");
            return false;
        }
        self.connection
            .engine()
            .call(method, params, on_response)
            .is_some()
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_owned(), value);
    Value::Object(map)
}

impl std::fmt::Debug for PartySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartySession")
            .field("state", &self.state())
            .field("connection", &self.connection)
            .finish()
    }
}
