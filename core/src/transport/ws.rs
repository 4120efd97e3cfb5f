//! Primary transport: TLS WebSocket with pinned certificate validation
//!
//! Owns the connection state machine and the reconnect policy. Reconnects
//! are desired until `disconnect()` is called or the peer closes with a
//! normal (1000) or policy-violation (1008) code; attempts are capped and
//! spaced by capped exponential backoff with jitter.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};

use crate::crypto::{AeadKey, PeerPublicKey};
use crate::protocol::constants::{KEY_EXCHANGE_TIMEOUT_MS, MAX_RECONNECT_ATTEMPTS};
use crate::protocol::{classify, ControlMessage, Frame};
use crate::store::TrustStore;
use crate::transport::pin::pinned_client_config;
use crate::transport::{
    reconnect_delay, session, CloseReason, ConnectionState, Transport, TransportKind,
};
use crate::{Error, Result};

#[derive(Clone)]
struct ConnectSeed {
    host: String,
    port: u16,
    peer_key: PeerPublicKey,
}

/// WebSocket transport to the paired desktop peer.
pub struct WsTransport {
    trust: Arc<TrustStore>,
    frames: mpsc::Sender<String>,
    state_tx: watch::Sender<ConnectionState>,
    session_key: RwLock<Option<AeadKey>>,
    seed: Mutex<Option<ConnectSeed>>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    reconnect_desired: AtomicBool,
    attempts: AtomicU32,
    handshaken: AtomicBool,
    running: AtomicBool,
    /// Bumped by `disconnect()`; the connection task watches for changes
    /// so a cancel is never lost, even mid-handshake.
    cancel_tx: watch::Sender<u64>,
}

impl WsTransport {
    /// Create the transport. Encrypted and unknown-type frames are
    /// forwarded to `frames`; recognized control traffic is handled here.
    pub fn new(trust: Arc<TrustStore>, frames: mpsc::Sender<String>) -> Arc<Self> {
        Arc::new(Self {
            trust,
            frames,
            state_tx: watch::channel(ConnectionState::Disconnected).0,
            session_key: RwLock::new(None),
            seed: Mutex::new(None),
            outgoing: Mutex::new(None),
            reconnect_desired: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
            handshaken: AtomicBool::new(false),
            running: AtomicBool::new(false),
            cancel_tx: watch::channel(0).0,
        })
    }

    /// Connect to the peer, recording `(host, port, peer_public_key)` as
    /// the reconnect seed. Idempotent: a second call while the connection
    /// task is alive only refreshes the seed.
    pub fn connect(self: &Arc<Self>, host: &str, port: u16, peer_key: PeerPublicKey) {
        *self.seed.lock().expect("seed lock poisoned") = Some(ConnectSeed {
            host: host.to_string(),
            port,
            peer_key,
        });
        self.reconnect_desired.store(true, Ordering::SeqCst);
        self.attempts.store(0, Ordering::SeqCst);

        if !self.running.swap(true, Ordering::SeqCst) {
            let this = self.clone();
            tokio::spawn(async move {
                this.run().await;
            });
        }
    }

    /// Cancel reconnection intent and close the connection.
    pub fn disconnect(&self) {
        self.reconnect_desired.store(false, Ordering::SeqCst);
        self.cancel_tx.send_modify(|generation| *generation += 1);
        self.clear_session_key();
    }

    async fn run(self: Arc<Self>) {
        let mut cancel_rx = self.cancel_tx.subscribe();

        loop {
            let seed = match self.seed.lock().expect("seed lock poisoned").clone() {
                Some(seed) => seed,
                None => break,
            };

            self.set_state(ConnectionState::Connecting);
            let outcome = self.connect_once(&seed, &mut cancel_rx).await;

            self.handshaken.store(false, Ordering::SeqCst);
            *self.outgoing.lock().expect("outgoing lock poisoned") = None;
            self.clear_session_key();
            self.set_state(ConnectionState::Disconnected);

            let reason = match outcome {
                Ok(reason) => reason,
                Err(e) => {
                    tracing::warn!(error = %e, "connection attempt failed");
                    close_reason_for_error(&e)
                }
            };

            if !self.reconnect_desired.load(Ordering::SeqCst) {
                break;
            }

            match reason {
                CloseReason::Normal | CloseReason::PolicyViolation => {
                    self.reconnect_desired.store(false, Ordering::SeqCst);
                    break;
                }
                CloseReason::Abnormal => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt > MAX_RECONNECT_ATTEMPTS {
                        tracing::warn!("giving up after {} reconnect attempts", attempt - 1);
                        break;
                    }

                    let delay = reconnect_delay(attempt);
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel_rx.changed() => break,
                    }

                    if !self.reconnect_desired.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    async fn connect_once(
        &self,
        seed: &ConnectSeed,
        cancel_rx: &mut watch::Receiver<u64>,
    ) -> Result<CloseReason> {
        let tls = Arc::new(pinned_client_config(self.trust.clone()));
        let url = format!("wss://{}:{}", seed.host, seed.port);

        let (ws, _response) =
            connect_async_tls_with_config(url, None, false, Some(Connector::Rustls(tls)))
                .await
                .map_err(map_connect_error)?;

        let (mut sink, mut stream) = ws.split();

        // Session handshake: only key_exchange out, only key_exchange_ack in.
        let (key, offer) = session::initiate(&seed.peer_key)?;
        sink.send(Message::Text(offer))
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let ack = tokio::time::timeout(
            std::time::Duration::from_millis(KEY_EXCHANGE_TIMEOUT_MS),
            await_text(&mut stream, &mut sink),
        )
        .await
        .map_err(|_| Error::Network("key exchange timed out".to_string()))??;

        let ack = match ack {
            Some(text) => text,
            None => return Ok(CloseReason::Abnormal),
        };

        if let Err(e) = session::complete(&ack) {
            let _ = sink
                .send(close_message(CloseCode::Policy, "key exchange failed"))
                .await;
            return Err(e);
        }

        *self.session_key.write().expect("session key lock poisoned") = Some(key);
        self.handshaken.store(true, Ordering::SeqCst);
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        tracing::info!(peer = %seed.host, "session established");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        *self.outgoing.lock().expect("outgoing lock poisoned") = Some(out_tx);

        let reason = loop {
            tokio::select! {
                biased;

                _ = cancel_rx.changed() => {
                    self.set_state(ConnectionState::Disconnecting);
                    let _ = sink
                        .send(close_message(CloseCode::Normal, "client disconnect"))
                        .await;
                    break CloseReason::Normal;
                }

                outgoing = out_rx.recv() => match outgoing {
                    Some(message) => {
                        if let Err(e) = sink.send(message).await {
                            tracing::warn!(error = %e, "send failed, waiting for close signal");
                            break CloseReason::Abnormal;
                        }
                    }
                    None => break CloseReason::Abnormal,
                },

                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.handle_incoming(&text).await,
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => break close_reason_from_frame(frame.as_ref()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "connection error");
                        break CloseReason::Abnormal;
                    }
                    None => break CloseReason::Abnormal,
                },
            }
        };

        Ok(reason)
    }

    async fn handle_incoming(&self, raw: &str) {
        match classify(raw) {
            Ok(Frame::Control(control)) => self.handle_control(control),
            Ok(Frame::Encrypted(_)) | Ok(Frame::Unknown(_)) => {
                if self.frames.send(raw.to_string()).await.is_err() {
                    tracing::warn!("frame listener dropped, discarding inbound frame");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
            }
        }
    }

    /// Recognized control traffic terminates here; it never reaches the
    /// clipboard path.
    fn handle_control(&self, control: ControlMessage) {
        match control {
            ControlMessage::ConnectionStatus { status, .. } => {
                tracing::debug!(%status, "peer connection status");
            }
            ControlMessage::ErrorReport {
                error_type,
                message,
                ..
            } => {
                tracing::warn!(%error_type, %message, "peer error report");
            }
            ControlMessage::ClipboardSyncResult {
                success,
                clipboard_id,
                ..
            } => {
                tracing::debug!(%clipboard_id, success, "peer sync result");
            }
            other => {
                tracing::debug!(?other, "ignoring control frame");
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn clear_session_key(&self) {
        *self.session_key.write().expect("session key lock poisoned") = None;
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Primary
    }

    async fn send(&self, frame: String) -> bool {
        if *self.state_tx.borrow() != ConnectionState::Connected
            || !self.handshaken.load(Ordering::SeqCst)
        {
            tracing::warn!("refusing send: connection not established");
            return false;
        }

        let sent = match &*self.outgoing.lock().expect("outgoing lock poisoned") {
            Some(tx) => tx.send(Message::Text(frame)).is_ok(),
            None => false,
        };

        if !sent && self.reconnect_desired.load(Ordering::SeqCst) {
            // The connection task observes the socket close and probes
            // again after the backoff delay; no immediate reconnect storm.
            tracing::warn!("send failed, reconnect probe deferred to backoff");
        }
        sent
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn session_key(&self) -> Option<AeadKey> {
        self.session_key
            .read()
            .expect("session key lock poisoned")
            .clone()
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Wait for the next text frame, transparently answering pings.
async fn await_text(
    stream: &mut futures_util::stream::SplitStream<WsStream>,
    sink: &mut futures_util::stream::SplitSink<WsStream, Message>,
) -> Result<Option<String>> {
    while let Some(message) = stream.next().await {
        match message.map_err(|e| Error::Network(e.to_string()))? {
            Message::Text(text) => return Ok(Some(text)),
            Message::Ping(payload) => {
                let _ = sink.send(Message::Pong(payload)).await;
            }
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}

fn close_message(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

fn close_reason_from_frame(frame: Option<&CloseFrame<'_>>) -> CloseReason {
    match frame.map(|f| f.code) {
        Some(CloseCode::Normal) => CloseReason::Normal,
        Some(CloseCode::Policy) => CloseReason::PolicyViolation,
        _ => CloseReason::Abnormal,
    }
}

/// Map an error raised before or during the handshake to its reconnect
/// consequence: trust and compatibility failures never reconnect.
fn close_reason_for_error(error: &Error) -> CloseReason {
    match error {
        Error::CertUntrusted
        | Error::WrapFail(_)
        | Error::UnwrapFail(_)
        | Error::HandshakeRejected(_)
        | Error::InvalidMessage(_) => CloseReason::PolicyViolation,
        _ => CloseReason::Abnormal,
    }
}

fn map_connect_error(error: tokio_tungstenite::tungstenite::Error) -> Error {
    let text = error.to_string();
    if text.contains("not pinned") {
        Error::CertUntrusted
    } else {
        Error::Network(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_mapping() {
        let normal = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        let policy = CloseFrame {
            code: CloseCode::Policy,
            reason: "".into(),
        };
        let away = CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        };

        assert_eq!(close_reason_from_frame(Some(&normal)), CloseReason::Normal);
        assert_eq!(
            close_reason_from_frame(Some(&policy)),
            CloseReason::PolicyViolation
        );
        assert_eq!(close_reason_from_frame(Some(&away)), CloseReason::Abnormal);
        assert_eq!(close_reason_from_frame(None), CloseReason::Abnormal);
    }

    #[test]
    fn test_trust_failures_never_reconnect() {
        assert_eq!(
            close_reason_for_error(&Error::CertUntrusted),
            CloseReason::PolicyViolation
        );
        assert_eq!(
            close_reason_for_error(&Error::HandshakeRejected("x".into())),
            CloseReason::PolicyViolation
        );
        assert_eq!(
            close_reason_for_error(&Error::Network("reset".into())),
            CloseReason::Abnormal
        );
    }

    #[tokio::test]
    async fn test_send_refused_when_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let pool =
            crate::store::db::init_db_pool(dir.path().join("t.db").to_str().unwrap()).unwrap();
        let trust = Arc::new(TrustStore::open(pool).unwrap());
        let (tx, _rx) = mpsc::channel(8);

        let transport = WsTransport::new(trust, tx);
        assert!(!transport.send("frame".to_string()).await);
        assert!(transport.session_key().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_clears_reconnect_intent() {
        let dir = tempfile::tempdir().unwrap();
        let pool =
            crate::store::db::init_db_pool(dir.path().join("t.db").to_str().unwrap()).unwrap();
        let trust = Arc::new(TrustStore::open(pool).unwrap());
        let (tx, _rx) = mpsc::channel(8);

        let transport = WsTransport::new(trust, tx);
        transport.disconnect();

        assert!(!transport.reconnect_desired.load(Ordering::SeqCst));
        assert_eq!(
            *transport.connection_state().borrow(),
            ConnectionState::Disconnected
        );
    }
}
