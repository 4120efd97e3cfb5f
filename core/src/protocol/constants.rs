//! Centralized protocol constants
//!
//! All protocol-level constants are defined here to ensure consistency
//! across the codebase and make configuration easier.

/// Default WebSocket port of the desktop peer
pub const DEFAULT_PORT: u16 = 8765;

/// Default clipboard item lifetime (24 hours, milliseconds)
pub const DEFAULT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Reconnection backoff base delay
pub const RECONNECT_BASE_DELAY_MS: u64 = 2_000;

/// Reconnection backoff ceiling
pub const RECONNECT_MAX_DELAY_MS: u64 = 60_000;

/// Uniform jitter added on top of the backoff delay
pub const RECONNECT_JITTER_MS: u64 = 1_000;

/// Reconnection attempt cap
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Pairing reachability probe timeout
pub const PAIRING_PROBE_TIMEOUT_MS: u64 = 3_000;

/// How long the client waits for the key exchange ack
pub const KEY_EXCHANGE_TIMEOUT_MS: u64 = 10_000;

/// Debounce window for inbound-item notifications
pub const NOTIFY_DEBOUNCE_MS: u64 = 500;

/// Window during which a just-written clipboard value is not re-sent
pub const LOOP_SUPPRESSION_WINDOW_MS: u64 = 2_000;

/// Local clipboard polling interval in milliseconds
pub const CLIPBOARD_POLL_INTERVAL_MS: u64 = 500;

/// Read buffer size of the fallback byte-stream transport
pub const FALLBACK_READ_BUF: usize = 1024;

/// Well-known serial-port service identifier of the fallback channel
pub const FALLBACK_SERVICE_ID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// Default sweep interval of the background TTL sweeper (24 hours)
pub const SWEEP_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;
