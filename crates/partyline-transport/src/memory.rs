//! An in-process [`Connection`] pair.
//!
//! [`memory_pair`] returns the client end, which plugs into
//! [`RpcConnection::start`](crate::RpcConnection::start), and a
//! [`MemoryPeer`] that plays the server: it pushes frames in, reads the
//! frames the client wrote, and can close the connection from the remote
//! side. Useful for exercising the whole client stack without a socket.

use tokio::sync::{Mutex, mpsc};

use crate::{CLOSE_ABNORMAL, CloseInfo, Connection, ConnectionId, Incoming, TransportError};

/// Creates a connected client/peer pair.
pub fn memory_pair() -> (MemoryConnection, MemoryPeer) {
    let (to_client, client_rx) = mpsc::unbounded_channel();
    let (client_tx, from_client) = mpsc::unbounded_channel();

    let conn = MemoryConnection {
        id: ConnectionId::next(),
        inbound: Mutex::new(client_rx),
        outbound: std::sync::Mutex::new(Some(client_tx)),
    };
    let peer = MemoryPeer {
        to_client,
        from_client: Mutex::new(from_client),
    };
    (conn, peer)
}

/// What the peer observes from the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// The client sent a frame.
    Frame(Vec<u8>),
    /// The client closed the connection.
    Closed { code: u16, reason: String },
}

/// The client end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Incoming>>,
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<PeerEvent>>>,
}

impl MemoryConnection {
    fn outbound(&self) -> Option<mpsc::UnboundedSender<PeerEvent>> {
        self.outbound
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let Some(tx) = self.outbound() else {
            return Err(TransportError::ConnectionClosed("closed locally".into()));
        };
        tx.send(PeerEvent::Frame(data.to_vec()))
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn recv(&self) -> Result<Incoming, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(incoming) => Ok(incoming),
            None => Ok(Incoming::Closed(CloseInfo::remote(
                CLOSE_ABNORMAL,
                "peer dropped",
            ))),
        }
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        let tx = self
            .outbound
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(PeerEvent::Closed {
                code,
                reason: reason.to_owned(),
            });
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The server end of an in-memory connection.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<Incoming>,
    from_client: Mutex<mpsc::UnboundedReceiver<PeerEvent>>,
}

impl MemoryPeer {
    /// Delivers a text frame to the client. Returns `false` once the
    /// client end is gone.
    pub fn send_text(&self, text: &str) -> bool {
        self.to_client
            .send(Incoming::Frame(text.as_bytes().to_vec()))
            .is_ok()
    }

    /// Closes the connection from the remote side.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.to_client
            .send(Incoming::Closed(CloseInfo::remote(code, reason)))
            .is_ok()
    }

    /// Waits for the next thing the client did. `None` once the client end
    /// has been dropped.
    pub async fn next_event(&self) -> Option<PeerEvent> {
        self.from_client.lock().await.recv().await
    }

    /// Waits for the next frame the client sent. A close yields `None`.
    pub async fn next_frame(&self) -> Option<Vec<u8>> {
        match self.next_event().await? {
            PeerEvent::Frame(frame) => Some(frame),
            PeerEvent::Closed { .. } => None,
        }
    }
}
