//! High-level AppConnect service that coordinates all components

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::clipboard::start_monitor;
use crate::crypto::PeerPublicKey;
use crate::pairing::PairingManager;
use crate::ports::{Associator, ForegroundProbe, LocalClipboard, Notifier};
use crate::store::{db::init_db_pool, ClipboardStore, Device, KeySlotStore, TrustStore};
use crate::sync::{start_sweeper, SweeperHandle, SyncEngine};
use crate::transport::{ConnectionState, Transport, WsTransport};
use crate::{Config, Error, Result};

const DB_FILE: &str = "appconnect.db";
const DEVICE_ID_FILE: &str = "device_id";

/// Main service: owns the stores, the primary transport, the sync engine
/// and the background sweeper.
pub struct SyncService {
    config: Config,
    device_id: String,
    trust: Arc<TrustStore>,
    store: Arc<ClipboardStore>,
    transport: Arc<WsTransport>,
    engine: Arc<SyncEngine>,
    pairing: PairingManager,
    frames_rx: Mutex<Option<mpsc::Receiver<String>>>,
    sweeper: Mutex<Option<SweeperHandle>>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl SyncService {
    pub fn new(
        config: Config,
        clipboard: Arc<dyn LocalClipboard>,
        notifier: Arc<dyn Notifier>,
        foreground: Arc<dyn ForegroundProbe>,
        associator: Arc<dyn Associator>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let db_path = config.data_dir.join(DB_FILE);
        let pool = init_db_pool(
            db_path
                .to_str()
                .ok_or_else(|| Error::Storage("non-UTF8 data dir".to_string()))?,
        )?;

        let at_rest = KeySlotStore::new(&config.data_dir).load_or_generate()?;
        let device_id = load_or_create_device_id(&config.data_dir)?;

        let trust = Arc::new(TrustStore::open(pool.clone())?);
        let store = Arc::new(ClipboardStore::open(pool, at_rest.clone())?);

        let (frames_tx, frames_rx) = mpsc::channel(64);
        let transport = WsTransport::new(trust.clone(), frames_tx);

        let engine = SyncEngine::new(
            store.clone(),
            transport.clone() as Arc<dyn Transport>,
            at_rest,
            clipboard,
            notifier,
            foreground,
            device_id.clone(),
        );

        let pairing = PairingManager::new(trust.clone(), transport.clone(), associator);

        Ok(Self {
            config,
            device_id,
            trust,
            store,
            transport,
            engine,
            pairing,
            frames_rx: Mutex::new(Some(frames_rx)),
            sweeper: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_name(&self) -> &str {
        &self.config.device_name
    }

    /// Observable state of the primary transport.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.connection_state()
    }

    pub fn clipboard_store(&self) -> &Arc<ClipboardStore> {
        &self.store
    }

    /// Start the inbound pump, the local clipboard monitor and the TTL
    /// sweeper. Call once.
    pub fn start(&self) -> Result<()> {
        let frames_rx = self
            .frames_rx
            .lock()
            .expect("frames lock poisoned")
            .take()
            .ok_or_else(|| Error::InvalidMessage("service already started".to_string()))?;

        let mut tasks = self.tasks.lock().expect("tasks lock poisoned");

        let engine = self.engine.clone();
        tasks.push(tokio::spawn(async move {
            let mut frames_rx = frames_rx;
            while let Some(frame) = frames_rx.recv().await {
                engine.handle_frame(&frame).await;
            }
        }));

        let engine = self.engine.clone();
        let poll = self.config.poll_interval;
        tasks.push(tokio::spawn(async move {
            let (mut changes, _monitor) = start_monitor(poll);
            while let Some(text) = changes.recv().await {
                if let Err(e) = engine.handle_local_change(&text).await {
                    tracing::warn!(error = %e, "outbound sync failed");
                }
            }
        }));

        let engine = self.engine.clone();
        let mut state_rx = self.transport.connection_state();
        tasks.push(tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                if *state_rx.borrow() == ConnectionState::Connected {
                    engine.replay_unsynced().await;
                }
            }
        }));

        *self.sweeper.lock().expect("sweeper lock poisoned") = Some(start_sweeper(
            self.store.clone(),
            self.config.sweep_interval,
        ));

        tracing::info!(device = %self.config.device_name, "appconnect service started");
        Ok(())
    }

    /// Pair from a scanned QR payload; connects on success.
    pub async fn pair(&self, qr_text: &str) -> Result<Device> {
        self.pairing.pair(qr_text).await
    }

    pub async fn unpair(&self, device_id: &str) -> Result<()> {
        self.pairing.unpair(device_id).await
    }

    pub fn devices(&self) -> Vec<Device> {
        self.trust.list()
    }

    /// Reconnect to an already-trusted device at a known address.
    pub fn connect_to(&self, host: &str, port: u16, device_id: &str) -> Result<()> {
        let device = self
            .trust
            .get_by_id(device_id)
            .ok_or_else(|| Error::InvalidMessage(format!("unknown device {}", device_id)))?;

        let peer_key = PeerPublicKey::from_base64_spki(&device.public_key)?;
        self.transport.connect(host, port, peer_key);
        Ok(())
    }

    /// Tear down: cancel reconnection, stop the sweeper and all tasks.
    pub fn shutdown(&self) {
        self.transport.disconnect();
        self.sweeper.lock().expect("sweeper lock poisoned").take();
        for task in self.tasks.lock().expect("tasks lock poisoned").drain(..) {
            task.abort();
        }
        tracing::info!("appconnect service stopped");
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn load_or_create_device_id(data_dir: &PathBuf) -> Result<String> {
    let path = data_dir.join(DEVICE_ID_FILE);

    match std::fs::read_to_string(&path) {
        Ok(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => {
            let id = Uuid::new_v4().to_string();
            std::fs::write(&path, &id)?;
            Ok(id)
        }
    }
}
