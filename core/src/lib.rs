//! AppConnect Core - clipboard sync between a mobile device and a PC
//!
//! This library provides the core functionality for syncing clipboard
//! content with a paired desktop peer over a mutually-authenticated
//! channel: QR-anchored pairing, fingerprint-pinned TLS, a per-session
//! AEAD key established by an RSA-OAEP handshake, and a TTL-bounded
//! offline store.

pub mod clipboard;
pub mod crypto;
pub mod pairing;
pub mod ports;
pub mod protocol;
pub mod service;
pub mod store;
pub mod sync;
pub mod transport;

mod error;

pub use error::{Error, Result};

/// Configuration for the AppConnect service
#[derive(Debug, Clone)]
pub struct Config {
    /// Name shown to peers
    pub device_name: String,
    /// Path to store persistent data (database, keys, device id)
    pub data_dir: std::path::PathBuf,
    /// Background TTL sweep cadence
    pub sweep_interval: std::time::Duration,
    /// Local clipboard polling interval
    pub poll_interval: std::time::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: "appconnect-device".to_string(),
            data_dir: dirs_home().join(".appconnect"),
            sweep_interval: std::time::Duration::from_millis(
                protocol::constants::SWEEP_INTERVAL_MS,
            ),
            poll_interval: std::time::Duration::from_millis(
                protocol::constants::CLIPBOARD_POLL_INTERVAL_MS,
            ),
        }
    }
}

fn dirs_home() -> std::path::PathBuf {
    dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."))
}

// Re-export key types for convenience
pub use protocol::{ClipboardItem, ContentType, QrPayload};
pub use service::SyncService;
pub use store::Device;
pub use transport::ConnectionState;
