//! Pairing and trust anchoring
//!
//! A scanned QR payload is the out-of-band trust anchor: it carries the
//! peer's address, long-term public key and pinned TLS fingerprint. The
//! trusted-device row is committed only after the peer answers a TCP
//! reachability probe, so a failed pairing leaves no partial state. The
//! association flow and the transport connect come after and may fail
//! without invalidating trust.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use uuid::Uuid;

use crate::crypto::PeerPublicKey;
use crate::ports::Associator;
use crate::protocol::constants::PAIRING_PROBE_TIMEOUT_MS;
use crate::protocol::{now_ms, QrPayload};
use crate::store::{Device, TrustStore};
use crate::transport::WsTransport;
use crate::{Error, Result};

pub struct PairingManager {
    trust: Arc<TrustStore>,
    transport: Arc<WsTransport>,
    associator: Arc<dyn Associator>,
}

impl PairingManager {
    pub fn new(
        trust: Arc<TrustStore>,
        transport: Arc<WsTransport>,
        associator: Arc<dyn Associator>,
    ) -> Self {
        Self {
            trust,
            transport,
            associator,
        }
    }

    /// Pair with the device described by the scanned QR text.
    pub async fn pair(&self, qr_text: &str) -> Result<Device> {
        let qr = QrPayload::decode(qr_text)?;
        let peer_key = PeerPublicKey::from_base64_spki(&qr.public_key)
            .map_err(|e| Error::QrMalformed(e.to_string()))?;

        probe_reachability(&qr.ip, qr.port).await?;

        let device = Device {
            id: Uuid::new_v4().to_string(),
            name: qr.name.clone(),
            public_key: qr.public_key.clone(),
            certificate_fingerprint: qr.certificate_fingerprint.clone(),
            last_seen: now_ms(),
            is_trusted: true,
            fallback_address: None,
        };
        self.trust.insert(device.clone()).await?;
        tracing::info!(device = %device.name, "device trusted");

        // Informational from here on: trust is already anchored.
        if let Err(e) = self.associator.associate(&device).await {
            tracing::warn!(error = %e, "companion association failed");
        }

        self.transport.connect(&qr.ip, qr.port, peer_key);

        Ok(device)
    }

    /// Remove the trusted device; the pin stops being accepted immediately.
    pub async fn unpair(&self, device_id: &str) -> Result<()> {
        self.trust.delete(device_id).await
    }
}

/// TCP reachability probe: open and immediately close a connection, with
/// a 3-second hard timeout.
async fn probe_reachability(ip: &str, port: u16) -> Result<()> {
    let attempt = tokio::time::timeout(
        Duration::from_millis(PAIRING_PROBE_TIMEOUT_MS),
        TcpStream::connect((ip, port)),
    )
    .await;

    match attempt {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(())
        }
        Ok(Err(e)) => Err(Error::Unreachable(format!("{}:{}: {}", ip, port, e))),
        Err(_) => Err(Error::Unreachable(format!(
            "{}:{}: probe timed out",
            ip, port
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentityKeyPair;
    use crate::ports::NoopAssociator;
    use crate::store::db::init_db_pool;
    use tokio::sync::mpsc;

    fn manager() -> (tempfile::TempDir, Arc<TrustStore>, PairingManager) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db_pool(dir.path().join("trust.db").to_str().unwrap()).unwrap();
        let trust = Arc::new(TrustStore::open(pool).unwrap());
        let (frames_tx, _frames_rx) = mpsc::channel(8);
        let transport = WsTransport::new(trust.clone(), frames_tx);
        let pairing = PairingManager::new(trust.clone(), transport, Arc::new(NoopAssociator));
        (dir, trust, pairing)
    }

    fn qr_for(ip: &str, port: u16) -> String {
        let key = IdentityKeyPair::generate()
            .unwrap()
            .public_key()
            .to_base64_spki()
            .unwrap();
        format!(
            r#"{{"n":"HostA","ip":"{}","p":{},"k":"{}","fp":"SHA256:ABCD"}}"#,
            ip, port, key
        )
    }

    #[tokio::test]
    async fn test_pair_persists_trusted_device() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (_dir, trust, pairing) = manager();
        let device = pairing.pair(&qr_for("127.0.0.1", port)).await.unwrap();

        assert!(device.is_trusted);
        assert_eq!(device.certificate_fingerprint, "SHA256:ABCD");
        assert_eq!(trust.list_trusted().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_peer_leaves_no_state() {
        let (_dir, trust, pairing) = manager();

        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = pairing.pair(&qr_for("127.0.0.1", port)).await.unwrap_err();
        assert!(matches!(err, Error::Unreachable(_)));
        assert!(trust.list().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_qr_rejected_early() {
        let (_dir, trust, pairing) = manager();

        let err = pairing.pair("{\"n\":\"only a name\"}").await.unwrap_err();
        assert!(matches!(err, Error::QrMalformed(_)));
        assert!(trust.list().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_public_key_rejected_before_probe() {
        let (_dir, trust, pairing) = manager();
        let raw = r#"{"n":"A","ip":"127.0.0.1","p":1,"k":"bm90YWtleQ==","fp":"SHA256:00"}"#;

        let err = pairing.pair(raw).await.unwrap_err();
        assert!(matches!(err, Error::QrMalformed(_)));
        assert!(trust.list().is_empty());
    }

    #[tokio::test]
    async fn test_unpair_revokes_trust() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (_dir, trust, pairing) = manager();
        let device = pairing.pair(&qr_for("127.0.0.1", port)).await.unwrap();

        pairing.unpair(&device.id).await.unwrap();
        assert!(trust.list_trusted().is_empty());
    }
}
