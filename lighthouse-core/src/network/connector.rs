//! Persistent WebSocket connection to the Lighthouse server.
//!
//! The [`Connector`] owns the socket, numbers outbound requests, wraps
//! canvas bytes in PUT envelopes, and runs a background receive task that
//! decodes server messages and hands them to a single [`MessageHandler`].
//!
//! ```text
//! caller ──send(bytes)──► [link lock] ──Envelope──► WebSocket sink
//!                                                        │
//! handler ◄──ServerMessage── receive task ◄── WebSocket stream
//! ```
//!
//! The link lock is held for the whole of [`Connector::start`], so a
//! concurrent `send` waits until the handshake has finished instead of
//! racing an unready socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, error, info, warn};

use crate::error::LighthouseError;
use crate::network::tls;
use crate::protocol::{Auth, Envelope, ServerMessage};
use crate::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `stop` waits for the server to acknowledge a close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ── MessageHandler ───────────────────────────────────────────────

/// Receives every decoded inbound message, on the receive task.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, msg: ServerMessage);
}

impl<F> MessageHandler for F
where
    F: Fn(ServerMessage) + Send + Sync + 'static,
{
    fn handle(&self, msg: ServerMessage) {
        self(msg)
    }
}

// ── RequestIds ───────────────────────────────────────────────────

/// Monotonic request id (REID) generator.
///
/// Starts at 0 and advances by one per envelope. The counter is a `u64`
/// and wraps silently on overflow.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

// ── ConnectorConfig ──────────────────────────────────────────────

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// WebSocket endpoint, `wss://` or `ws://`.
    pub url: String,
    pub auth: Auth,
    /// Deadline for the handshake and for each frame write.
    pub timeout: Duration,
    /// When `false`, any server certificate is accepted.
    pub verify_certificates: bool,
}

// ── Connector ────────────────────────────────────────────────────

struct Link {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
}

/// Owner of the display connection.
pub struct Connector {
    config: ConnectorConfig,
    handler: Arc<dyn MessageHandler>,
    link: Mutex<Option<Link>>,
    reid: RequestIds,
    state: Arc<watch::Sender<ConnectionState>>,
    /// Why the last connection ended, if it ended on its own.
    failure: Arc<StdMutex<Option<String>>>,
}

impl Connector {
    pub fn new(config: ConnectorConfig, handler: Arc<dyn MessageHandler>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            handler,
            link: Mutex::new(None),
            reid: RequestIds::new(),
            state: Arc::new(state),
            failure: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Reason the most recent connection failed, if it did.
    pub fn last_error(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The REID the next request will carry.
    pub fn next_request_id(&self) -> u64 {
        self.reid.peek()
    }

    /// (Re)open the connection.
    ///
    /// Closes any existing connection first. Returns once the WebSocket
    /// handshake has completed; handshake failures are returned here and
    /// leave the connector disconnected.
    pub async fn start(&self) -> Result<(), LighthouseError> {
        let mut link = self.link.lock().await;
        self.shutdown(&mut link).await;
        self.set_failure(None);

        self.transition(ConnectionState::begin_connect);
        debug!("connecting to {}", self.config.url);

        let stream = match self.open().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("connection to {} failed: {e}", self.config.url);
                self.set_failure(Some(e.to_string()));
                self.transition(ConnectionState::finish_close);
                return Err(e);
            }
        };

        // Connected before the reader exists, so an immediate server close
        // is seen as a failure of this connection.
        self.transition(ConnectionState::complete_connect);
        let (sink, stream) = stream.split();
        let reader = tokio::spawn(receive_loop(
            stream,
            Arc::clone(&self.handler),
            Arc::clone(&self.state),
            Arc::clone(&self.failure),
        ));
        *link = Some(Link { sink, reader });

        info!("connected to {}", self.config.url);
        Ok(())
    }

    /// Close the connection. No-op when nothing is open.
    pub async fn stop(&self) {
        let mut link = self.link.lock().await;
        self.shutdown(&mut link).await;
    }

    /// Send one canvas as a PUT request. Returns the request's REID.
    pub async fn send(&self, image: &[u8]) -> Result<u64, LighthouseError> {
        let auth = &self.config.auth;
        self.transmit(|reid| Envelope::put(reid, auth, image)).await
    }

    /// Subscribe to remote input with a STREAM request.
    pub async fn request_stream(&self) -> Result<u64, LighthouseError> {
        let auth = &self.config.auth;
        self.transmit(|reid| Envelope::stream(reid, auth)).await
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn open(&self) -> Result<WsStream, LighthouseError> {
        let request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| LighthouseError::InvalidUrl(format!("{}: {e}", self.config.url)))?;
        let connector = tls::connector(self.config.verify_certificates)?;

        let handshake = connect_async_tls_with_config(request, None, true, connector);
        let (stream, _response) = tokio::time::timeout(self.config.timeout, handshake)
            .await
            .map_err(|_| LighthouseError::Timeout(self.config.timeout))??;
        Ok(stream)
    }

    async fn transmit(
        &self,
        build: impl FnOnce(u64) -> Envelope,
    ) -> Result<u64, LighthouseError> {
        let mut guard = self.link.lock().await;
        let Some(link) = guard.as_mut() else {
            return Err(LighthouseError::NotConnected);
        };

        let alive = self.state.borrow().is_connected();
        if !alive {
            let reason = self
                .last_error()
                .unwrap_or_else(|| "connection closed".to_string());
            if let Some(dead) = guard.take() {
                dead.reader.abort();
            }
            return Err(LighthouseError::ConnectionLost(reason));
        }

        let reid = self.reid.next_id();
        let bytes = build(reid).to_bytes()?;
        let write = link.sink.send(Message::Binary(bytes.into()));

        let err = match tokio::time::timeout(self.config.timeout, write).await {
            Ok(Ok(())) => return Ok(reid),
            Ok(Err(e)) => LighthouseError::from(e),
            Err(_) => LighthouseError::Timeout(self.config.timeout),
        };

        // A failed write ends the connection.
        error!("send of request {reid} failed: {err}");
        self.set_failure(Some(err.to_string()));
        self.state.send_modify(ConnectionState::force_disconnect);
        if let Some(dead) = guard.take() {
            dead.reader.abort();
        }
        Err(err)
    }

    async fn shutdown(&self, link: &mut Option<Link>) {
        let Some(mut current) = link.take() else {
            return;
        };
        info!("closing the connection");
        self.transition(ConnectionState::begin_close);

        if let Err(e) = tokio::time::timeout(self.config.timeout, current.sink.close()).await {
            debug!("close frame not sent: {e}");
        }
        if tokio::time::timeout(CLOSE_GRACE, &mut current.reader)
            .await
            .is_err()
        {
            current.reader.abort();
        }
        self.state.send_modify(ConnectionState::force_disconnect);
    }

    /// Apply a transition, logging instead of failing when it does not fit
    /// the current state (the receive task may have moved it already).
    fn transition(&self, step: fn(&mut ConnectionState) -> Result<(), LighthouseError>) {
        self.state.send_modify(|state| {
            if let Err(e) = step(state) {
                debug!("state transition skipped: {e}");
            }
        });
    }

    fn set_failure(&self, reason: Option<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = reason;
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.reader.abort();
        }
    }
}

// ── Receive task ─────────────────────────────────────────────────

async fn receive_loop(
    mut stream: SplitStream<WsStream>,
    handler: Arc<dyn MessageHandler>,
    state: Arc<watch::Sender<ConnectionState>>,
    failure: Arc<StdMutex<Option<String>>>,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Binary(bytes))) => match ServerMessage::from_bytes(&bytes) {
                Ok(msg) => handler.handle(msg),
                Err(e) => warn!("skipping undecodable frame ({} bytes): {e}", bytes.len()),
            },
            Some(Ok(Message::Text(text))) => debug!("ignoring text frame: {}", text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) => format!(
                        "closed by server: {} {}",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => "closed by server".to_string(),
                };
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break e.to_string(),
            None => break "connection stream ended".to_string(),
        }
    };

    // Only a connection that was still up counts as lost; during `stop`
    // the state is already `Closing`.
    let lost = state.send_if_modified(|s| {
        if s.is_connected() {
            s.force_disconnect();
            true
        } else {
            false
        }
    });
    if lost {
        error!("connection lost: {reason}");
        *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
    } else {
        debug!("receive task finished: {reason}");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> ConnectorConfig {
        ConnectorConfig {
            url: url.to_string(),
            auth: Auth::new("alice", "token"),
            timeout: Duration::from_secs(2),
            verify_certificates: true,
        }
    }

    fn connector(url: &str) -> Connector {
        Connector::new(config(url), Arc::new(|_msg: ServerMessage| {}))
    }

    #[test]
    fn request_ids_start_at_zero_and_increase() {
        let ids = RequestIds::new();
        assert_eq!(ids.peek(), 0);
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn request_ids_wrap() {
        let ids = RequestIds {
            next: AtomicU64::new(u64::MAX),
        };
        assert_eq!(ids.next_id(), u64::MAX);
        assert_eq!(ids.next_id(), 0);
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let c = connector("ws://127.0.0.1:9/websocket");
        assert!(matches!(
            c.send(&[0; 3]).await,
            Err(LighthouseError::NotConnected)
        ));
        // No id is consumed by a refused send.
        assert_eq!(c.next_request_id(), 0);
    }

    #[tokio::test]
    async fn stop_without_connection_is_noop() {
        let c = connector("ws://127.0.0.1:9/websocket");
        c.stop().await;
        c.stop().await;
        assert!(c.state().is_disconnected());
    }

    #[tokio::test]
    async fn invalid_url_is_reported() {
        let c = connector("not a url");
        assert!(matches!(
            c.start().await,
            Err(LighthouseError::InvalidUrl(_))
        ));
        assert!(c.state().is_disconnected());
        assert!(c.last_error().is_some());
    }

    #[tokio::test]
    async fn refused_connection_returns_to_disconnected() {
        // Bind then drop a listener to get a port nobody listens on.
        let port = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let c = connector(&format!("ws://127.0.0.1:{port}/websocket"));
        let err = c.start().await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
        assert!(c.state().is_disconnected());
        assert!(!c.is_connected());
    }
}
