//! Joins a party and logs everything that happens in it.
//!
//! ```text
//! PARTYLINE_LOCATION=https://party.example.com \
//! PARTYLINE_TOKEN=... \
//! PARTYLINE_PARTY=42 \
//! RUST_LOG=debug cargo run -p party-cli
//! ```
//!
//! Ctrl-C leaves the party and closes the session.

use std::sync::Arc;
use std::time::Duration;

use partyline::prelude::*;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

enum Lifecycle {
    Opened,
    Closed,
}

/// Logs every callback and reports open/close to `main`.
struct LoggingListener(mpsc::UnboundedSender<Lifecycle>);

impl PartyListener for LoggingListener {
    fn on_open(&self) {
        tracing::info!("session open");
        let _ = self.0.send(Lifecycle::Opened);
    }

    fn on_close(&self, code: u16, reason: &str, remote: bool) {
        tracing::info!(code, reason, remote, "session closed");
        let _ = self.0.send(Lifecycle::Closed);
    }

    fn on_error(&self, error: &TransportError) {
        tracing::error!(error = %error, "transport error");
    }

    fn on_party_info_received(&self, party: &Party, members: &[PartyMember]) {
        tracing::info!(
            party = %party.id,
            members = party.num_members,
            max = party.max_members,
            "roster"
        );
        for member in members {
            tracing::info!(account = %member.account, role = member.role, "  member");
        }
    }

    fn on_player_joined(&self, member: &PartyMember) {
        tracing::info!(account = %member.account, role = member.role, "player joined");
    }

    fn on_player_left(&self, member: &PartyMember) {
        tracing::info!(account = %member.account, "player left");
    }

    fn on_game_starting(&self, payload: &Value) {
        tracing::info!(%payload, "game starting");
    }

    fn on_game_start_failed(&self, code: i64, reason: &str) {
        tracing::warn!(code, reason, "game start failed");
    }

    fn on_game_started(&self, game: &GameStarted) {
        tracing::info!(
            room = %game.id,
            host = %game.location.host,
            ports = ?game.location.ports,
            "game started"
        );
    }

    fn on_party_closed(&self, payload: &Value) {
        tracing::info!(%payload, "party closed");
    }

    fn on_custom_message(&self, payload: &Value) {
        tracing::info!(%payload, "message");
    }

    fn on_protocol_error(&self, error: &PushError) {
        tracing::warn!(error = %error, "protocol error");
    }
}

#[derive(Debug, PartialEq)]
enum Leave {
    Left(Value),
    Failed(RpcError),
    NoAnswer,
    NotSent,
}

/// Sends `leave_party` and waits up to `wait` for the answer, so the
/// socket is not closed underneath the call.
async fn leave(session: &PartySession, wait: Duration) -> Leave {
    let (tx, rx) = oneshot::channel();
    let sent = session.leave(move |result| {
        let _ = tx.send(result);
    });
    if !sent {
        return Leave::NotSent;
    }
    match tokio::time::timeout(wait, rx).await {
        Ok(Ok(Ok(result))) => Leave::Left(result),
        Ok(Ok(Err(e))) => Leave::Failed(e),
        Ok(Err(_)) | Err(_) => Leave::NoAnswer,
    }
}

fn env(name: &str) -> Result<String, PartylineError> {
    std::env::var(name).map_err(|_| PartylineError::Config(format!("{name} is not set")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = PartyClient::builder()
        .location(env("PARTYLINE_LOCATION")?)
        .token(env("PARTYLINE_TOKEN")?)
        .build()?;
    let path = SessionPath::Connect {
        party_id: env("PARTYLINE_PARTY")?,
    };

    let (tx, mut lifecycle) = mpsc::unbounded_channel();
    let session = client.open(
        &path,
        &PartyOptions::default(),
        Arc::new(LoggingListener(tx)),
    )?;

    loop {
        tokio::select! {
            event = lifecycle.recv() => match event {
                Some(Lifecycle::Opened) => {
                    let joined = session.join(json!({"client": "party-cli"}), None, |result| {
                        match result {
                            Ok(result) => tracing::info!(%result, "joined"),
                            Err(e) => tracing::error!(error = %e, "join failed"),
                        }
                    });
                    if !joined {
                        tracing::warn!("join not sent");
                    }
                }
                Some(Lifecycle::Closed) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("leaving");
                match leave(&session, LEAVE_TIMEOUT).await {
                    Leave::Left(result) => tracing::info!(%result, "left party"),
                    Leave::Failed(e) => tracing::warn!(error = %e, "leave failed"),
                    Leave::NoAnswer => tracing::warn!("no answer to leave, closing anyway"),
                    Leave::NotSent => tracing::warn!("leave not sent"),
                }
                session.close(1000, "bye");
            }
        }
    }

    Ok(())
}
