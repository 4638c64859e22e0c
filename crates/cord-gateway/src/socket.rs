//! One duplex gateway connection at a time, plus reconnect timing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use cord_proto::close_code;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ConnectionStateError, GatewayError, GatewayResult};
use crate::reconnect::ReconnectConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a local close waits for the close frame to be flushed.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Raw connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The connection opened.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The connection closed. Reported once per connection.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
        /// Whether a close frame was exchanged.
        was_clean: bool,
    },
    /// A transport error, usually followed by `Closed`.
    Errored(String),
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    alive: Arc<AtomicBool>,
    reported: Arc<AtomicBool>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Resets a flag when dropped.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the lifetime of the physical gateway connection.
///
/// Inbound traffic and lifecycle changes are pushed as [`SocketEvent`]s to
/// the channel given at construction. After [`disconnect`](Self::disconnect)
/// the socket is finalized and never opens again.
pub struct GatewaySocket {
    url: String,
    reconnect: ReconnectConfig,
    events: mpsc::UnboundedSender<SocketEvent>,
    connection: Mutex<Option<Connection>>,
    connecting: AtomicBool,
    reconnecting: AtomicBool,
    attempts: AtomicU32,
    finalized: CancellationToken,
}

impl std::fmt::Debug for GatewaySocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySocket")
            .field("url", &self.url)
            .field("alive", &self.is_alive())
            .field("attempts", &self.reconnect_attempts())
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}

impl GatewaySocket {
    /// Create a closed socket for `url`.
    pub fn new(
        url: impl Into<String>,
        reconnect: ReconnectConfig,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            reconnect,
            events,
            connection: Mutex::new(None),
            connecting: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
            finalized: CancellationToken::new(),
        }
    }

    /// Gateway URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a connection is open.
    pub fn is_alive(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|conn| conn.alive.load(Ordering::SeqCst))
    }

    /// Whether no connection is open.
    pub fn is_closed(&self) -> bool {
        !self.is_alive()
    }

    /// Whether [`disconnect`](Self::disconnect) has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized.is_cancelled()
    }

    /// Consecutive reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Open the connection.
    pub async fn connect(&self) -> GatewayResult<()> {
        if self.is_finalized() {
            return Err(ConnectionStateError::ReconnectOnClosedSocket.into());
        }
        if self.is_alive() {
            return Err(ConnectionStateError::AlreadyConnected.into());
        }
        if self.connecting.swap(true, Ordering::SeqCst) {
            return Err(ConnectionStateError::AlreadyConnecting.into());
        }
        let _guard = FlagGuard(&self.connecting);

        debug!(url = %self.url, "opening gateway connection");
        let (stream, _) = tokio::select! {
            () = self.finalized.cancelled() => {
                return Err(ConnectionStateError::ReconnectOnClosedSocket.into());
            }
            result = tokio_tungstenite::connect_async(self.url.as_str()) => {
                result.map_err(|e| GatewayError::Transport(format!("failed to connect: {e}")))?
            }
        };

        let stale = self.connection.lock().take();
        if let Some(stale) = stale {
            stale.reported.store(true, Ordering::SeqCst);
            stale.cancel.cancel();
        }

        let (write, read) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let reported = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let reader = tokio::spawn(Self::reader_task(
            read,
            self.events.clone(),
            Arc::clone(&alive),
            Arc::clone(&reported),
            cancel.clone(),
        ));
        let writer = tokio::spawn(Self::writer_task(write, outbound_rx, cancel.clone()));

        *self.connection.lock() = Some(Connection {
            outbound,
            alive,
            reported,
            cancel,
            reader,
            writer,
        });

        self.attempts.store(0, Ordering::SeqCst);
        info!(url = %self.url, "gateway connection opened");
        let _ = self.events.send(SocketEvent::Opened);
        Ok(())
    }

    /// Wait out the backoff delay, then connect. Retries until a connection
    /// opens or the socket is finalized.
    pub async fn reconnect(&self) -> GatewayResult<()> {
        if self.is_finalized() {
            return Err(ConnectionStateError::ReconnectOnClosedSocket.into());
        }
        if self.is_alive() {
            return Err(ConnectionStateError::AlreadyConnected.into());
        }
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return Err(ConnectionStateError::AlreadyConnecting.into());
        }
        let _guard = FlagGuard(&self.reconnecting);

        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = self.reconnect.delay_for_attempt(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting to gateway");

            tokio::select! {
                () = self.finalized.cancelled() => {
                    return Err(ConnectionStateError::ReconnectOnClosedSocket.into());
                }
                () = tokio::time::sleep(delay) => {}
            }

            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(GatewayError::Transport(reason)) => {
                    warn!(attempt, error = %reason, "reconnect attempt failed");
                    let _ = self.events.send(SocketEvent::Errored(reason));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Queue a text frame for sending.
    pub fn send(&self, text: String) -> GatewayResult<()> {
        let connection = self.connection.lock();
        let conn = connection
            .as_ref()
            .filter(|conn| conn.alive.load(Ordering::SeqCst))
            .ok_or(ConnectionStateError::NotConnected)?;
        conn.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| GatewayError::Transport("writer stopped".to_string()))
    }

    /// Close the current connection with `code` and report it as a clean
    /// close, so the owner's normal close handling runs.
    pub async fn restart(&self, code: u16, reason: &str) {
        let Some(conn) = self.connection.lock().take() else {
            return;
        };
        let reported = !conn.reported.swap(true, Ordering::SeqCst);
        Self::close_connection(conn, code, reason).await;

        if reported {
            let _ = self.events.send(SocketEvent::Closed {
                code,
                reason: reason.to_string(),
                was_clean: true,
            });
        }
    }

    /// Close for good. Stops any pending reconnect; no `Closed` event is
    /// reported for a connection closed this way.
    pub async fn disconnect(&self) {
        self.finalized.cancel();
        let conn = self.connection.lock().take();
        if let Some(conn) = conn {
            conn.reported.store(true, Ordering::SeqCst);
            Self::close_connection(conn, close_code::NORMAL, "client disconnect").await;
            info!(url = %self.url, "gateway connection closed");
        }
    }

    async fn close_connection(conn: Connection, code: u16, reason: &str) {
        conn.alive.store(false, Ordering::SeqCst);
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let _ = conn.outbound.send(Message::Close(Some(frame)));
        drop(conn.outbound);

        let mut writer = conn.writer;
        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
        }
        conn.cancel.cancel();
        let _ = conn.reader.await;
    }

    async fn reader_task(
        mut read: SplitStream<WsStream>,
        events: mpsc::UnboundedSender<SocketEvent>,
        alive: Arc<AtomicBool>,
        reported: Arc<AtomicBool>,
        cancel: CancellationToken,
    ) {
        let (code, reason, was_clean) = loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return,
                next = read.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string(), true),
                        None => (close_code::NO_STATUS, String::new(), true),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(SocketEvent::Errored(e.to_string()));
                    break (close_code::ABNORMAL, e.to_string(), false);
                }
                None => break (close_code::ABNORMAL, "connection closed".to_string(), false),
            }
        };

        alive.store(false, Ordering::SeqCst);
        cancel.cancel();
        if !reported.swap(true, Ordering::SeqCst) {
            debug!(code, reason = %reason, "gateway connection closed by peer");
            let _ = events.send(SocketEvent::Closed {
                code,
                reason,
                was_clean,
            });
        }
    }

    async fn writer_task(
        mut write: SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
        cancel: CancellationToken,
    ) {
        loop {
            let msg = tokio::select! {
                biased;
                msg = rx.recv() => msg,
                () = cancel.cancelled() => break,
            };

            let Some(msg) = msg else { break };
            let closing = matches!(msg, Message::Close(_));
            if write.send(msg).await.is_err() || closing {
                break;
            }
        }
    }
}
