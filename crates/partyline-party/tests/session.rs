//! Integration tests for `PartySession`, with an in-memory peer playing the
//! party service.

use std::sync::Arc;

use partyline_party::{
    GameStarted, Party, PartyError, PartyListener, PartyMember, PartySession, PushError,
    SessionState,
};
use partyline_protocol::{ErrorCode, RpcError};
use partyline_transport::memory::{MemoryConnection, MemoryPeer, PeerEvent, memory_pair};
use partyline_transport::{ConnectionConfig, TransportError};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

// =========================================================================
// Helpers
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Open,
    Close(u16, String, bool),
    Error,
    Roster(Party, Vec<PartyMember>),
    Joined(PartyMember),
    Left(PartyMember),
    Starting(Value),
    StartFailed(i64, String),
    Started(GameStarted),
    Closed(Value),
    Custom(Value),
    ProtocolError(PushError),
}

struct Recorder(mpsc::UnboundedSender<Event>);

impl Recorder {
    fn push(&self, event: Event) {
        let _ = self.0.send(event);
    }
}

impl PartyListener for Recorder {
    fn on_open(&self) {
        self.push(Event::Open);
    }
    fn on_close(&self, code: u16, reason: &str, remote: bool) {
        self.push(Event::Close(code, reason.to_owned(), remote));
    }
    fn on_error(&self, _error: &TransportError) {
        self.push(Event::Error);
    }
    fn on_party_info_received(&self, party: &Party, members: &[PartyMember]) {
        self.push(Event::Roster(party.clone(), members.to_vec()));
    }
    fn on_player_joined(&self, member: &PartyMember) {
        self.push(Event::Joined(member.clone()));
    }
    fn on_player_left(&self, member: &PartyMember) {
        self.push(Event::Left(member.clone()));
    }
    fn on_game_starting(&self, payload: &Value) {
        self.push(Event::Starting(payload.clone()));
    }
    fn on_game_start_failed(&self, code: i64, reason: &str) {
        self.push(Event::StartFailed(code, reason.to_owned()));
    }
    fn on_game_started(&self, game: &GameStarted) {
        self.push(Event::Started(game.clone()));
    }
    fn on_party_closed(&self, payload: &Value) {
        self.push(Event::Closed(payload.clone()));
    }
    fn on_custom_message(&self, payload: &Value) {
        self.push(Event::Custom(payload.clone()));
    }
    fn on_protocol_error(&self, error: &PushError) {
        self.push(Event::ProtocolError(error.clone()));
    }
}

struct Harness {
    session: PartySession,
    peer: MemoryPeer,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Harness {
    /// An open session wired to an in-memory peer.
    async fn open() -> Self {
        let (tx, mut events) = mpsc::unbounded_channel();
        let session = PartySession::new(Arc::new(Recorder(tx)), ConnectionConfig::default());
        let (client, peer) = memory_pair();
        session.start(async move { Ok(client) }).unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(events.recv().await, Some(Event::Open));
        assert!(session.is_open());
        Self {
            session,
            peer,
            events,
        }
    }

    fn push(&self, params: Value) {
        let frame = json!({"jsonrpc": "2.0", "method": "message", "params": params});
        assert!(self.peer.send_text(&frame.to_string()));
    }

    fn push_roster(&self, params: Value) {
        let frame = json!({"jsonrpc": "2.0", "method": "party", "params": params});
        assert!(self.peer.send_text(&frame.to_string()));
    }

    async fn next_event(&mut self) -> Event {
        self.events.recv().await.expect("listener should receive an event")
    }

    async fn next_frame(&self) -> Value {
        let frame = self.peer.next_frame().await.expect("client should send a frame");
        serde_json::from_slice(&frame).unwrap()
    }

    /// Sends a `leave_party` and returns its request, proving nothing else
    /// was written before it.
    async fn probe(&self) -> Value {
        assert!(self.session.leave(|_| {}));
        let frame = self.next_frame().await;
        assert_eq!(frame["method"], "leave_party");
        frame
    }
}

fn responder() -> (
    impl FnOnce(Result<Value, RpcError>) + Send + 'static,
    oneshot::Receiver<Result<Value, RpcError>>,
) {
    let (tx, rx) = oneshot::channel();
    (
        move |result: Result<Value, RpcError>| {
            let _ = tx.send(result);
        },
        rx,
    )
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_open_twice_is_rejected() {
    let h = Harness::open().await;
    let (client, _peer) = memory_pair();
    let err = h.session.start(async move { Ok(client) }).unwrap_err();
    assert!(matches!(err, PartyError::InvalidState(SessionState::Open)));
}

#[tokio::test]
async fn test_connect_failure_closes_session() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let session = PartySession::new(Arc::new(Recorder(tx)), ConnectionConfig::default());
    session
        .start(async {
            Err::<MemoryConnection, _>(TransportError::ConnectionClosed("refused".into()))
        })
        .unwrap();

    assert_eq!(events.recv().await, Some(Event::Error));
    assert!(matches!(events.recv().await, Some(Event::Close(1006, _, true))));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.leave(|_| {}));
}

#[tokio::test]
async fn test_remote_close_fails_pending_and_refuses_operations() {
    let mut h = Harness::open().await;
    let (on_response, rx) = responder();
    assert!(h.session.start_game(json!({}), on_response));
    let _ = h.next_frame().await;

    h.peer.close(4000, "party expired");
    assert_eq!(
        h.next_event().await,
        Event::Close(4000, "party expired".into(), true)
    );
    assert_eq!(h.session.state(), SessionState::Closed);

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConnectionClosed.code());

    assert!(!h.session.join(json!({}), None, |_| panic!("must not be called")));
    assert!(!h.session.close(1000, "late"));
}

#[tokio::test]
async fn test_local_close() {
    let mut h = Harness::open().await;

    assert!(h.session.close(1000, "bye"));
    assert_eq!(h.session.state(), SessionState::Closed);
    assert!(!h.session.is_open());
    assert!(!h.session.leave(|_| {}));

    assert_eq!(
        h.peer.next_event().await,
        Some(PeerEvent::Closed {
            code: 1000,
            reason: "bye".into()
        })
    );
    assert_eq!(h.next_event().await, Event::Close(1000, "bye".into(), false));
}

// =========================================================================
// Operations
// =========================================================================

#[tokio::test]
async fn test_join_request_and_response() {
    let h = Harness::open().await;
    let (on_response, rx) = responder();

    assert!(h.session.join(
        json!({"name": "Ann"}),
        Some(json!({"rank": {"@gte": 5}})),
        on_response
    ));
    let request = h.next_frame().await;
    assert_eq!(request["method"], "join_party");
    assert_eq!(request["id"], 1);
    assert_eq!(
        request["params"],
        json!({"member_profile": {"name": "Ann"}, "check_members": {"rank": {"@gte": 5}}})
    );

    h.peer
        .send_text(r#"{"jsonrpc":"2.0","id":1,"result":{"account":"a1"}}"#);
    assert_eq!(rx.await.unwrap(), Ok(json!({"account": "a1"})));
}

#[tokio::test]
async fn test_join_without_check_members() {
    let h = Harness::open().await;
    assert!(h.session.join(json!({}), None, |_| {}));
    let request = h.next_frame().await;
    assert_eq!(request["params"], json!({"member_profile": {}}));
}

#[tokio::test]
async fn test_operation_wire_methods() {
    let h = Harness::open().await;

    assert!(h.session.leave(|_| {}));
    assert!(h.session.send_custom_message(json!({"text": "gl"}), |_| {}));
    assert!(h.session.close_party(json!("done"), |_| {}));
    assert!(h.session.start_game(json!({"map": "docks"}), |_| {}));

    let frames = [
        h.next_frame().await,
        h.next_frame().await,
        h.next_frame().await,
        h.next_frame().await,
    ];
    assert_eq!(frames[0]["method"], "leave_party");
    assert!(frames[0].get("params").is_none());
    assert_eq!(frames[1]["method"], "send_message");
    assert_eq!(frames[1]["params"], json!({"payload": {"text": "gl"}}));
    assert_eq!(frames[2]["method"], "close_party");
    assert_eq!(frames[2]["params"], json!({"message": "done"}));
    assert_eq!(frames[3]["method"], "start_game");
    assert_eq!(frames[3]["params"], json!({"message": {"map": "docks"}}));

    let ids: Vec<u64> = frames.iter().map(|f| f["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, [1, 2, 3, 4]);
}

#[tokio::test]
async fn test_application_error_reaches_callback() {
    let h = Harness::open().await;
    let (on_response, rx) = responder();
    assert!(h.session.start_game(json!({}), on_response));
    let _ = h.next_frame().await;

    h.peer.send_text(
        r#"{"jsonrpc":"2.0","id":1,"error":{"code":403,"message":"Only the owner can start"}}"#,
    );
    assert_eq!(
        rx.await.unwrap(),
        Err(RpcError::new(403, "Only the owner can start"))
    );
}

// =========================================================================
// Message pushes
// =========================================================================

#[tokio::test]
async fn test_player_joined_notification() {
    let mut h = Harness::open().await;
    h.peer.send_text(
        r#"{"jsonrpc":"2.0","method":"message","params":{"message_type":"player_joined","payload":{"account":"a1","role":2}}}"#,
    );

    match h.next_event().await {
        Event::Joined(member) => {
            assert_eq!(member.account, "a1");
            assert_eq!(member.role, 2);
        }
        other => panic!("expected player joined, got {other:?}"),
    }

    // Notifications are never answered: the next frame out is the probe.
    let probe = h.probe().await;
    assert_eq!(probe["id"], 1);
}

#[tokio::test]
async fn test_game_started_missing_location_is_protocol_error() {
    let mut h = Harness::open().await;
    h.push(json!({
        "message_type": "game_started",
        "payload": {"id": "room-1", "key": "k", "settings": {}}
    }));

    assert_eq!(
        h.next_event().await,
        Event::ProtocolError(PushError::MissingField {
            message_type: "game_started".into(),
            field: "location",
        })
    );

    // Nothing else was delivered for that push.
    h.push(json!({"message_type": "custom", "payload": 1}));
    assert_eq!(h.next_event().await, Event::Custom(json!(1)));
}

#[tokio::test]
async fn test_game_started_delivered() {
    let mut h = Harness::open().await;
    h.push(json!({
        "message_type": "game_started",
        "payload": {
            "id": "room-1",
            "slot": "2",
            "key": "k",
            "location": {"host": "game.example.com", "ports": [7777]},
            "settings": {"map": "docks"}
        }
    }));

    match h.next_event().await {
        Event::Started(game) => {
            assert_eq!(game.id, "room-1");
            assert_eq!(game.location.host, "game.example.com");
            assert_eq!(game.location.ports, vec![7777]);
        }
        other => panic!("expected game started, got {other:?}"),
    }
}

#[tokio::test]
async fn test_every_message_kind_reaches_its_callback() {
    let mut h = Harness::open().await;
    h.push(json!({"message_type": "player_left", "payload": {"account": "a2", "role": 0}}));
    h.push(json!({"message_type": "game_starting", "payload": {"eta": 3}}));
    h.push(json!({"message_type": "game_start_failed", "payload": {"code": 503, "reason": "no hosts"}}));
    h.push(json!({"message_type": "party_closed", "payload": {"by": "owner"}}));
    h.push(json!({"message_type": "custom", "payload": "hi"}));

    assert!(matches!(h.next_event().await, Event::Left(m) if m.account == "a2"));
    assert_eq!(h.next_event().await, Event::Starting(json!({"eta": 3})));
    assert_eq!(h.next_event().await, Event::StartFailed(503, "no hosts".into()));
    assert_eq!(h.next_event().await, Event::Closed(json!({"by": "owner"})));
    assert_eq!(h.next_event().await, Event::Custom(json!("hi")));
}

#[tokio::test]
async fn test_unknown_message_type_is_reported() {
    let mut h = Harness::open().await;
    h.push(json!({"message_type": "confetti", "payload": {}}));
    assert_eq!(
        h.next_event().await,
        Event::ProtocolError(PushError::UnknownMessageType("confetti".into()))
    );
}

#[tokio::test]
async fn test_push_request_is_answered() {
    let mut h = Harness::open().await;

    h.peer.send_text(
        r#"{"jsonrpc":"2.0","method":"message","id":"p1","params":{"message_type":"custom","payload":{}}}"#,
    );
    assert_eq!(h.next_event().await, Event::Custom(json!({})));
    assert_eq!(
        h.next_frame().await,
        json!({"jsonrpc": "2.0", "result": true, "id": "p1"})
    );

    h.peer.send_text(
        r#"{"jsonrpc":"2.0","method":"message","id":"p2","params":{"message_type":"nope"}}"#,
    );
    assert!(matches!(h.next_event().await, Event::ProtocolError(_)));
    let reply = h.next_frame().await;
    assert_eq!(reply["id"], "p2");
    assert_eq!(reply["error"]["code"], ErrorCode::InvalidParams.code());
}

// =========================================================================
// Roster snapshots
// =========================================================================

#[tokio::test]
async fn test_roster_snapshot_replaces_cache() {
    let mut h = Harness::open().await;
    assert_eq!(h.session.party(), None);

    h.push_roster(json!({
        "party": {"id": "p1", "num_members": 2, "max_members": 4},
        "members": [{"account": "a1", "role": 1}, {"account": "a2", "role": 0}]
    }));
    let Event::Roster(party, members) = h.next_event().await else {
        panic!("expected roster");
    };
    assert_eq!(party.id, "p1");
    assert_eq!(members.len(), 2);
    assert_eq!(h.session.party(), Some(party));
    assert_eq!(h.session.members(), members);

    // Joins do not touch the cache.
    h.push(json!({"message_type": "player_joined", "payload": {"account": "a3", "role": 0}}));
    assert!(matches!(h.next_event().await, Event::Joined(_)));
    assert_eq!(h.session.members().len(), 2);

    // The next snapshot replaces everything.
    h.push_roster(json!({
        "party": {"id": "p1", "num_members": 1, "max_members": 4, "settings": {"x": 1}},
        "members": [{"account": "a3", "role": 0}]
    }));
    assert!(matches!(h.next_event().await, Event::Roster(..)));
    let members = h.session.members();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].account, "a3");
    assert_eq!(h.session.party().unwrap().settings, json!({"x": 1}));
}

#[tokio::test]
async fn test_roster_skips_malformed_members() {
    let mut h = Harness::open().await;
    h.push_roster(json!({
        "party": {"id": "p1", "num_members": 3, "max_members": 4},
        "members": [{"account": "a1", "role": 1}, {"account": 7}, {"account": "a3", "role": 0}]
    }));
    let Event::Roster(_, members) = h.next_event().await else {
        panic!("expected roster");
    };
    let accounts: Vec<&str> = members.iter().map(|m| m.account.as_str()).collect();
    assert_eq!(accounts, ["a1", "a3"]);
}

#[tokio::test]
async fn test_malformed_roster_keeps_previous_cache() {
    let mut h = Harness::open().await;
    h.push_roster(json!({
        "party": {"id": "p1", "num_members": 1, "max_members": 2},
        "members": [{"account": "a1", "role": 1}]
    }));
    assert!(matches!(h.next_event().await, Event::Roster(..)));

    h.push_roster(json!({"members": []}));
    assert_eq!(
        h.next_event().await,
        Event::ProtocolError(PushError::MissingField {
            message_type: "party".into(),
            field: "party",
        })
    );
    assert_eq!(h.session.party().unwrap().id, "p1");
    assert_eq!(h.session.members().len(), 1);
}
