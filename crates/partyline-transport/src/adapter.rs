//! [`RpcConnection`]: one RPC engine bound to one connection.
//!
//! The adapter owns a background "driver" task per connection. The flow is:
//!   1. Await the connect future (racing a local close request)
//!   2. Mark the link open → `on_open`
//!   3. Loop: forward inbound frames to the engine, write queued outbound
//!      frames, sweep expired calls on a timer, watch for a local close
//!   4. On any ending: mark the link closed, fail every pending call,
//!      then `on_close`
//!
//! There is no reconnection. Once the driver exits, the adapter is done.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use partyline_rpc::{EngineConfig, FrameSink, RpcEngine};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
#[cfg(feature = "websocket")]
use url::Url;

use crate::{CLOSE_ABNORMAL, CLOSE_NORMAL, CloseInfo, Connection, Incoming, TransportError};

// ---------------------------------------------------------------------------
// Configuration and lifecycle hooks
// ---------------------------------------------------------------------------

/// Configuration for an [`RpcConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Settings for the engine bound to this connection.
    pub engine: EngineConfig,

    /// How often the driver sweeps the pending table for calls that
    /// outlived [`EngineConfig::call_timeout`].
    ///
    /// Default: 1 second.
    pub sweep_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Receives connection lifecycle events.
///
/// Called from the driver task. For any one connection the order is:
/// at most one `on_open`, any number of `on_error`, exactly one `on_close`.
pub trait ConnectionObserver: Send + Sync + 'static {
    /// The handshake completed; calls can now be delivered.
    fn on_open(&self) {}

    /// The connection is over, whichever side ended it.
    fn on_close(&self, close: &CloseInfo) {
        let _ = close;
    }

    /// A transport-level failure. Always followed by `on_close`.
    fn on_error(&self, error: &TransportError) {
        let _ = error;
    }
}

// ---------------------------------------------------------------------------
// Link: the engine's view of the connection
// ---------------------------------------------------------------------------

/// Implements [`FrameSink`] by queueing frames for the driver task.
struct Link {
    open: AtomicBool,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl Link {
    fn shut(&self) {
        self.open.store(false, Ordering::Release);
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl FrameSink for Link {
    fn send_frame(&self, frame: Vec<u8>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// A request from the handle to the driver task.
enum Command {
    Close { code: u16, reason: String },
}

/// Channel ends the driver consumes, parked until `start` is called.
struct DriverInputs {
    commands: mpsc::UnboundedReceiver<Command>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// RpcConnection
// ---------------------------------------------------------------------------

/// Binds one [`RpcEngine`] to one duplex connection.
///
/// The engine exists from construction, so handlers can be registered
/// before the connection opens. Until the handshake completes (and after
/// the connection closes) the engine's sink reports closed, and every
/// `call`/`notify` returns without sending.
pub struct RpcConnection {
    engine: Arc<RpcEngine>,
    link: Arc<Link>,
    sweep_interval: Duration,
    commands: mpsc::UnboundedSender<Command>,
    inputs: Mutex<Option<DriverInputs>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcConnection {
    /// Creates an idle adapter and its engine.
    pub fn new(config: ConnectionConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let link = Arc::new(Link {
            open: AtomicBool::new(false),
            outbound: Mutex::new(Some(outbound_tx)),
        });
        let engine = Arc::new(RpcEngine::new(
            Arc::clone(&link) as Arc<dyn FrameSink>,
            config.engine,
        ));

        Self {
            engine,
            link,
            sweep_interval: config.sweep_interval,
            commands: command_tx,
            inputs: Mutex::new(Some(DriverInputs {
                commands: command_rx,
                outbound: outbound_rx,
            })),
            task: Mutex::new(None),
        }
    }

    /// The engine bound to this connection.
    pub fn engine(&self) -> &Arc<RpcEngine> {
        &self.engine
    }

    /// Whether the connection is open and frames can be delivered.
    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Connects to `location` over WebSocket and starts the driver.
    ///
    /// Returns as soon as the driver is spawned; the outcome of the
    /// handshake is reported through `observer`.
    #[cfg(feature = "websocket")]
    pub fn open(
        &self,
        location: Url,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<(), TransportError> {
        tracing::info!(host = location.host_str().unwrap_or_default(), "opening connection");
        self.start(crate::WebSocketConnection::connect(location), observer)
    }

    /// Starts the driver over any [`Connection`]. `connect` resolves to the
    /// connection once its handshake is done.
    ///
    /// # Errors
    /// - [`TransportError::AlreadyStarted`] if this adapter was started before.
    /// - [`TransportError::NoRuntime`] if called outside a Tokio runtime.
    pub fn start<C, F>(
        &self,
        connect: F,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<(), TransportError>
    where
        C: Connection,
        F: Future<Output = Result<C, TransportError>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::NoRuntime(e.to_string()))?;

        let inputs = self
            .inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TransportError::AlreadyStarted)?;

        let driver = Driver {
            engine: Arc::clone(&self.engine),
            link: Arc::clone(&self.link),
            observer,
            sweep_interval: self.sweep_interval,
        };
        let handle = runtime.spawn(driver.run(connect, inputs));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Asks the driver to close the connection with `code` and `reason`.
    ///
    /// Works while connecting too: the handshake is abandoned. Returns
    /// `false` if the adapter was never started or has already finished.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        let started = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if !started {
            return false;
        }
        self.link.open.store(false, Ordering::Release);
        self.commands
            .send(Command::Close {
                code,
                reason: reason.to_owned(),
            })
            .is_ok()
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        // Drop is synchronous, so the driver cannot be asked to close
        // gracefully; abort it and sweep what it would have swept.
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.link.shut();
        self.engine.fail_all_pending();
    }
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("open", &self.is_open())
            .field("engine", &self.engine)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

struct Driver {
    engine: Arc<RpcEngine>,
    link: Arc<Link>,
    observer: Arc<dyn ConnectionObserver>,
    sweep_interval: Duration,
}

impl Driver {
    async fn run<C, F>(self, connect: F, mut inputs: DriverInputs)
    where
        C: Connection,
        F: Future<Output = Result<C, TransportError>> + Send + 'static,
    {
        // --- Step 1: Handshake, unless closed first ---
        let conn = tokio::select! {
            result = connect => match result {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "connect failed");
                    self.observer.on_error(&e);
                    self.finish(CloseInfo::remote(CLOSE_ABNORMAL, e.to_string()));
                    return;
                }
            },
            cmd = inputs.commands.recv() => {
                let close = match cmd {
                    Some(Command::Close { code, reason }) => CloseInfo::local(code, reason),
                    None => CloseInfo::local(CLOSE_NORMAL, "client dropped"),
                };
                tracing::debug!("closed before handshake completed");
                self.finish(close);
                return;
            }
        };

        let conn_id = conn.id();
        self.link.open.store(true, Ordering::Release);
        tracing::info!(%conn_id, "connection open");
        self.observer.on_open();

        // --- Step 2: Frame loop ---
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let close = loop {
            tokio::select! {
                incoming = conn.recv() => match incoming {
                    Ok(Incoming::Frame(data)) => {
                        tracing::trace!(%conn_id, len = data.len(), "frame received");
                        self.engine.on_frame_received(&data);
                    }
                    Ok(Incoming::Closed(close)) => {
                        tracing::debug!(%conn_id, code = close.code, "closed by peer");
                        break close;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        self.observer.on_error(&e);
                        break CloseInfo::remote(CLOSE_ABNORMAL, e.to_string());
                    }
                },

                Some(frame) = inputs.outbound.recv() => {
                    if let Err(e) = conn.send(&frame).await {
                        tracing::debug!(%conn_id, error = %e, "send error");
                        self.observer.on_error(&e);
                        break CloseInfo::remote(CLOSE_ABNORMAL, e.to_string());
                    }
                }

                cmd = inputs.commands.recv() => {
                    let (code, reason) = match cmd {
                        Some(Command::Close { code, reason }) => (code, reason),
                        None => (CLOSE_NORMAL, "client dropped".to_owned()),
                    };
                    // Frames queued before the close still go out.
                    while let Ok(frame) = inputs.outbound.try_recv() {
                        if conn.send(&frame).await.is_err() {
                            break;
                        }
                    }
                    if let Err(e) = conn.close(code, &reason).await {
                        tracing::debug!(%conn_id, error = %e, "close handshake failed");
                    }
                    break CloseInfo::local(code, reason);
                }

                _ = sweep.tick() => {
                    let expired = self.engine.expire_stale(Instant::now());
                    if expired > 0 {
                        tracing::debug!(%conn_id, expired, "expired stale calls");
                    }
                }
            }
        };

        // --- Step 3: Teardown ---
        self.finish(close);
    }

    fn finish(&self, close: CloseInfo) {
        self.link.shut();
        self.engine.fail_all_pending();
        tracing::info!(
            code = close.code,
            reason = %close.reason,
            remote = close.remote,
            "connection closed"
        );
        self.observer.on_close(&close);
    }
}
