//! Peer transports
//!
//! The primary transport is a TLS WebSocket with fingerprint-pinned
//! certificate validation; the fallback is a serial byte-stream over a
//! paired short-range channel. Both run the session key handshake before
//! any clipboard frame moves.

mod fallback;
mod pin;
pub mod session;
mod ws;

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::watch;

use crate::crypto::AeadKey;
use crate::protocol::constants::{
    RECONNECT_BASE_DELAY_MS, RECONNECT_JITTER_MS, RECONNECT_MAX_DELAY_MS,
};

pub use fallback::{ByteStream, ByteStreamDialer, FallbackTransport};
pub use pin::{certificate_fingerprint, pinned_client_config, PinnedCertVerifier};
pub use ws::WsTransport;

/// Connection lifecycle of a transport instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Primary,
    Fallback,
}

/// Why a connection ended, driving the reconnect decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// Normal close (1000): no reconnect
    Normal,
    /// Policy violation (1008): no reconnect, session key cleared
    PolicyViolation,
    /// Anything else: reconnect per policy
    Abnormal,
}

/// Common surface the sync engine drives.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Queue one frame for delivery. Refuses (returns `false`) unless the
    /// connection is open and the session handshake has completed.
    async fn send(&self, frame: String) -> bool;

    /// Observable connection state.
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    /// The active session AEAD key, or `None` outside an established
    /// session. Atomic getter; the key never leaves process memory.
    fn session_key(&self) -> Option<AeadKey>;
}

/// Base reconnect delay for a 1-based attempt counter:
/// `min(base · 2^(attempt−1), max)`.
pub(crate) fn base_delay_ms(attempt: u32) -> u64 {
    let shift = attempt.saturating_sub(1).min(31);
    RECONNECT_BASE_DELAY_MS
        .saturating_mul(1u64 << shift)
        .min(RECONNECT_MAX_DELAY_MS)
}

/// Full reconnect delay: capped exponential backoff plus uniform jitter.
pub(crate) fn reconnect_delay(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..RECONNECT_JITTER_MS);
    Duration::from_millis(base_delay_ms(attempt) + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        assert_eq!(base_delay_ms(1), 2_000);
        assert_eq!(base_delay_ms(2), 4_000);
        assert_eq!(base_delay_ms(3), 8_000);
        assert_eq!(base_delay_ms(4), 16_000);
    }

    #[test]
    fn test_backoff_monotonic_and_saturating() {
        let mut last = 0;
        for attempt in 1..=64 {
            let delay = base_delay_ms(attempt);
            assert!(delay >= last, "delay decreased at attempt {}", attempt);
            assert!(delay <= RECONNECT_MAX_DELAY_MS);
            last = delay;
        }
        assert_eq!(base_delay_ms(64), RECONNECT_MAX_DELAY_MS);
    }

    #[test]
    fn test_jitter_bounded() {
        for attempt in 1..=12 {
            let base = base_delay_ms(attempt);
            let total = reconnect_delay(attempt).as_millis() as u64;
            assert!(total >= base);
            assert!(total < base + RECONNECT_JITTER_MS);
        }
    }
}
