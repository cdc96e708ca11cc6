//! Integration tests for `RpcConnection`, driven through an in-memory peer.
//!
//! The peer plays the server: it reads the frames the client writes,
//! answers them, and can close the connection from its side. Everything
//! runs on the test's own runtime, so there are no sockets and no ports.

use std::sync::Arc;
use std::time::Duration;

use partyline_protocol::{ErrorCode, RpcError};
use partyline_rpc::EngineConfig;
use partyline_transport::memory::{MemoryConnection, MemoryPeer, PeerEvent, memory_pair};
use partyline_transport::{
    CloseInfo, ConnectionConfig, ConnectionObserver, RpcConnection, TransportError,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Open,
    Close(CloseInfo),
    Error(String),
}

/// Forwards every lifecycle event to a channel the test can await.
struct ChannelObserver(mpsc::UnboundedSender<Event>);

impl ConnectionObserver for ChannelObserver {
    fn on_open(&self) {
        let _ = self.0.send(Event::Open);
    }

    fn on_close(&self, close: &CloseInfo) {
        let _ = self.0.send(Event::Close(close.clone()));
    }

    fn on_error(&self, error: &TransportError) {
        let _ = self.0.send(Event::Error(error.to_string()));
    }
}

fn observer() -> (Arc<ChannelObserver>, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelObserver(tx)), rx)
}

/// Starts `conn` over a fresh memory pair and waits for `on_open`.
async fn open(conn: &RpcConnection) -> (MemoryPeer, mpsc::UnboundedReceiver<Event>) {
    let (client, peer) = memory_pair();
    let (obs, mut events) = observer();
    conn.start(async move { Ok(client) }, obs).unwrap();
    assert_eq!(events.recv().await, Some(Event::Open));
    (peer, events)
}

async fn next_json(peer: &MemoryPeer) -> Value {
    let frame = peer.next_frame().await.expect("client should send a frame");
    serde_json::from_slice(&frame).unwrap()
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_not_open_before_start() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    assert!(!conn.is_open());
    assert!(conn.engine().call("ping", None, |_| {}).is_none());
    assert!(!conn.close(1000, "never started"));
}

#[tokio::test]
async fn test_open_fires_observer_and_marks_open() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (_peer, _events) = open(&conn).await;
    assert!(conn.is_open());
    assert!(conn.engine().is_open());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (_peer, _events) = open(&conn).await;

    let (client, _peer2) = memory_pair();
    let (obs, _rx) = observer();
    let err = conn.start(async move { Ok(client) }, obs).unwrap_err();
    assert!(matches!(err, TransportError::AlreadyStarted));
}

#[test]
fn test_start_outside_runtime_is_rejected() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (client, _peer) = memory_pair();
    let (obs, _rx) = observer();
    let err = conn.start(async move { Ok(client) }, obs).unwrap_err();
    assert!(matches!(err, TransportError::NoRuntime(_)));
}

#[tokio::test]
async fn test_connect_failure_reports_error_then_close() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (obs, mut events) = observer();
    conn.start(
        async { Err::<MemoryConnection, _>(TransportError::ConnectionClosed("refused".into())) },
        obs,
    )
    .unwrap();

    assert!(matches!(events.recv().await, Some(Event::Error(_))));
    match events.recv().await {
        Some(Event::Close(close)) => {
            assert_eq!(close.code, 1006);
            assert!(close.remote);
        }
        other => panic!("expected close, got {other:?}"),
    }
    assert!(!conn.is_open());
}

#[tokio::test]
async fn test_close_while_connecting_abandons_handshake() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (obs, mut events) = observer();
    conn.start(std::future::pending::<Result<MemoryConnection, _>>(), obs)
        .unwrap();

    assert!(conn.close(1000, "changed my mind"));
    assert_eq!(
        events.recv().await,
        Some(Event::Close(CloseInfo::local(1000, "changed my mind")))
    );
    // No on_open ever arrives.
    assert_eq!(events.recv().await, None);
}

// =========================================================================
// Frames
// =========================================================================

#[tokio::test]
async fn test_call_round_trip_through_peer() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (peer, _events) = open(&conn).await;

    let rx = conn
        .engine()
        .call_async("join_party", Some(json!({"profile": {}})))
        .unwrap();

    let request = next_json(&peer).await;
    assert_eq!(request["method"], "join_party");
    assert_eq!(request["id"], 1);

    peer.send_text(r#"{"jsonrpc":"2.0","result":{"joined":true},"id":1}"#);
    assert_eq!(rx.await.unwrap(), Ok(json!({"joined": true})));
    assert_eq!(conn.engine().pending_count(), 0);
}

#[tokio::test]
async fn test_handler_registered_before_open_answers_peer() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    conn.engine().register_handler(
        "echo",
        |params: Option<Value>| -> Result<Option<Value>, RpcError> { Ok(params) },
    );
    let (peer, _events) = open(&conn).await;

    peer.send_text(r#"{"jsonrpc":"2.0","method":"echo","params":[7],"id":"s1"}"#);
    let reply = next_json(&peer).await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": [7], "id": "s1"}));
}

#[tokio::test]
async fn test_garbage_from_peer_gets_parse_error() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (peer, _events) = open(&conn).await;

    peer.send_text("{not json");
    let reply = next_json(&peer).await;
    assert_eq!(reply["error"]["code"], -32700);
    assert!(reply.get("id").is_none());
}

// =========================================================================
// Closing
// =========================================================================

#[tokio::test]
async fn test_remote_close_fails_pending_calls() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (peer, mut events) = open(&conn).await;

    let rx = conn.engine().call_async("leave_party", None).unwrap();
    let _ = next_json(&peer).await;

    peer.close(4001, "party disbanded");
    assert_eq!(
        events.recv().await,
        Some(Event::Close(CloseInfo::remote(4001, "party disbanded")))
    );

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConnectionClosed.code());
    assert!(!conn.is_open());
    assert!(conn.engine().call("late", None, |_| {}).is_none());
}

#[tokio::test]
async fn test_dropped_peer_is_abnormal_close() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (peer, mut events) = open(&conn).await;

    drop(peer);
    match events.recv().await {
        Some(Event::Close(close)) => {
            assert_eq!(close.code, 1006);
            assert!(close.remote);
        }
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_local_close_flushes_and_notifies_peer() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (peer, mut events) = open(&conn).await;

    assert!(conn.engine().notify("bye", None));
    assert!(conn.close(1000, "done"));
    assert!(!conn.is_open());

    let notification = next_json(&peer).await;
    assert_eq!(notification["method"], "bye");
    assert_eq!(
        peer.next_event().await,
        Some(PeerEvent::Closed {
            code: 1000,
            reason: "done".into()
        })
    );
    assert_eq!(
        events.recv().await,
        Some(Event::Close(CloseInfo::local(1000, "done")))
    );
}

#[tokio::test]
async fn test_drop_fails_pending_calls() {
    let conn = RpcConnection::new(ConnectionConfig::default());
    let (_peer, _events) = open(&conn).await;

    let rx = conn.engine().call_async("start_game", None).unwrap();
    drop(conn);

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConnectionClosed.code());
}

// =========================================================================
// Timeout sweep
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sweep_expires_unanswered_call() {
    let config = ConnectionConfig {
        engine: EngineConfig::default().with_call_timeout(Some(Duration::from_secs(5))),
        sweep_interval: Duration::from_millis(500),
    };
    let conn = RpcConnection::new(config);
    let (peer, _events) = open(&conn).await;

    let rx = conn.engine().call_async("send_message", None).unwrap();
    let _ = next_json(&peer).await;

    // The paused clock auto-advances while every task is idle.
    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.code, ErrorCode::RequestTimeout.code());
    assert_eq!(err.message, "Request timed out");
    assert!(conn.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_answered_call_is_not_expired() {
    let config = ConnectionConfig {
        engine: EngineConfig::default().with_call_timeout(Some(Duration::from_secs(5))),
        sweep_interval: Duration::from_millis(500),
    };
    let conn = RpcConnection::new(config);
    let (peer, _events) = open(&conn).await;

    let rx = conn.engine().call_async("close_party", None).unwrap();
    let _ = next_json(&peer).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    peer.send_text(r#"{"jsonrpc":"2.0","result":true,"id":1}"#);

    assert_eq!(rx.await.unwrap(), Ok(json!(true)));
}
