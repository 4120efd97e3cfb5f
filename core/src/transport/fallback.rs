//! Fallback transport: serial byte-stream over a paired short-range channel
//!
//! The platform supplies the actual socket through [`ByteStreamDialer`]
//! (an RFCOMM channel on hardware, an in-memory duplex in tests). Framing
//! is 1:1 with writes, so callers pass exactly one envelope per `send`.
//! Text only; the sync engine refuses IMAGE/FILE here. The session key
//! handshake runs over this channel with the same codec as the primary.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::crypto::{AeadKey, PeerPublicKey};
use crate::protocol::constants::{FALLBACK_READ_BUF, FALLBACK_SERVICE_ID, KEY_EXCHANGE_TIMEOUT_MS};
use crate::transport::{session, ConnectionState, Transport, TransportKind};
use crate::{Error, Result};

/// Any duplex byte stream usable as the fallback channel.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Opens the serial channel to a fallback address.
#[async_trait]
pub trait ByteStreamDialer: Send + Sync {
    async fn dial(&self, address: &str, service_id: &str) -> std::io::Result<Box<dyn ByteStream>>;
}

/// Serial byte-stream transport for when the primary link is unavailable.
pub struct FallbackTransport {
    dialer: Arc<dyn ByteStreamDialer>,
    frames: mpsc::Sender<String>,
    state_tx: watch::Sender<ConnectionState>,
    session_key: RwLock<Option<AeadKey>>,
    writer: tokio::sync::Mutex<Option<WriteHalf<Box<dyn ByteStream>>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl FallbackTransport {
    pub fn new(dialer: Arc<dyn ByteStreamDialer>, frames: mpsc::Sender<String>) -> Arc<Self> {
        Arc::new(Self {
            dialer,
            frames,
            state_tx: watch::channel(ConnectionState::Disconnected).0,
            session_key: RwLock::new(None),
            writer: tokio::sync::Mutex::new(None),
            reader_task: Mutex::new(None),
        })
    }

    /// Open the channel and run the session handshake over it.
    pub async fn connect(self: &Arc<Self>, address: &str, peer_key: &PeerPublicKey) -> Result<()> {
        self.set_state(ConnectionState::Connecting);

        let stream = self
            .dialer
            .dial(address, FALLBACK_SERVICE_ID)
            .await
            .map_err(|e| {
                self.set_state(ConnectionState::Disconnected);
                Error::Network(format!("fallback dial failed: {}", e))
            })?;

        let (mut read_half, mut write_half) = tokio::io::split(stream);

        let key = match establish_session(&mut read_half, &mut write_half, peer_key).await {
            Ok(key) => key,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        *self.session_key.write().expect("session key lock poisoned") = Some(key);
        *self.writer.lock().await = Some(write_half);
        self.set_state(ConnectionState::Connected);
        tracing::info!(%address, "fallback channel established");

        let this = self.clone();
        let task = tokio::spawn(async move {
            this.read_loop(read_half).await;
        });
        *self.reader_task.lock().expect("reader task lock poisoned") = Some(task);

        Ok(())
    }

    /// Close the channel and drop the session key.
    pub async fn disconnect(&self) {
        self.set_state(ConnectionState::Disconnecting);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(task) = self
            .reader_task
            .lock()
            .expect("reader task lock poisoned")
            .take()
        {
            task.abort();
        }

        *self.session_key.write().expect("session key lock poisoned") = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Read loop: each chunk (up to the fixed buffer size) is one message.
    async fn read_loop(self: Arc<Self>, mut reader: ReadHalf<Box<dyn ByteStream>>) {
        let mut buf = vec![0u8; FALLBACK_READ_BUF];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => match std::str::from_utf8(&buf[..n]) {
                    Ok(text) => {
                        if self.frames.send(text.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        tracing::warn!("dropping non-text chunk on fallback channel");
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "fallback read failed");
                    break;
                }
            }
        }

        *self.session_key.write().expect("session key lock poisoned") = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

async fn establish_session(
    reader: &mut ReadHalf<Box<dyn ByteStream>>,
    writer: &mut WriteHalf<Box<dyn ByteStream>>,
    peer_key: &PeerPublicKey,
) -> Result<AeadKey> {
    let (key, offer) = session::initiate(peer_key)?;

    writer
        .write_all(offer.as_bytes())
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;

    let mut buf = vec![0u8; FALLBACK_READ_BUF];
    let n = tokio::time::timeout(
        std::time::Duration::from_millis(KEY_EXCHANGE_TIMEOUT_MS),
        reader.read(&mut buf),
    )
    .await
    .map_err(|_| Error::Network("key exchange timed out".to_string()))?
    .map_err(|e| Error::Network(e.to_string()))?;

    if n == 0 {
        return Err(Error::Network(
            "fallback channel closed during key exchange".to_string(),
        ));
    }

    let ack = std::str::from_utf8(&buf[..n])
        .map_err(|_| Error::InvalidMessage("non-text key exchange ack".to_string()))?;
    session::complete(ack)?;

    Ok(key)
}

#[async_trait]
impl Transport for FallbackTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Fallback
    }

    async fn send(&self, frame: String) -> bool {
        if *self.state_tx.borrow() != ConnectionState::Connected {
            tracing::warn!("refusing fallback send: not connected");
            return false;
        }

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return false;
        };

        let result = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "fallback send failed");
                false
            }
        }
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
