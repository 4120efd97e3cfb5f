//! Fingerprint-pinned certificate validation
//!
//! The TLS layer trusts no CA. A server certificate is accepted iff the
//! SHA-256 of its DER encoding matches the pin stored for some trusted
//! device. Hostname verification is disabled on purpose: peers are dialed
//! by IP and SAN matching would add nothing beyond the pin. This verifier
//! is called synchronously from inside the handshake, so it only touches
//! the trust store's in-memory cache.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

use crate::crypto::sha256_hex_upper;
use crate::store::TrustStore;

/// Canonical fingerprint of a DER-encoded certificate:
/// `SHA256:` followed by uppercase hex.
pub fn certificate_fingerprint(der: &[u8]) -> String {
    format!("SHA256:{}", sha256_hex_upper(der))
}

/// Server certificate verifier that accepts exactly the trusted pin set.
pub struct PinnedCertVerifier {
    trust: Arc<TrustStore>,
    provider: Arc<CryptoProvider>,
}

impl std::fmt::Debug for PinnedCertVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedCertVerifier").finish_non_exhaustive()
    }
}

impl PinnedCertVerifier {
    pub fn new(trust: Arc<TrustStore>, provider: Arc<CryptoProvider>) -> Self {
        Self { trust, provider }
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let fingerprint = certificate_fingerprint(end_entity.as_ref());

        if self.trust.is_fingerprint_trusted(&fingerprint) {
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::warn!(%fingerprint, "rejecting server certificate: fingerprint not pinned");
            Err(rustls::Error::General(
                "certificate fingerprint not pinned".to_string(),
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Client TLS config whose only trust source is the pinned fingerprints.
pub fn pinned_client_config(trust: Arc<TrustStore>) -> rustls::ClientConfig {
    let builder = rustls::ClientConfig::builder();
    let provider = builder.crypto_provider().clone();
    let verifier = PinnedCertVerifier::new(trust, provider);

    builder
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::db::init_db_pool;
    use crate::store::Device;

    fn test_trust_store() -> (tempfile::TempDir, Arc<TrustStore>) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db_pool(dir.path().join("trust.db").to_str().unwrap()).unwrap();
        (dir, Arc::new(TrustStore::open(pool).unwrap()))
    }

    fn verifier(trust: Arc<TrustStore>) -> PinnedCertVerifier {
        let builder = rustls::ClientConfig::builder();
        let provider = builder.crypto_provider().clone();
        PinnedCertVerifier::new(trust, provider)
    }

    fn device_pinning(fingerprint: &str, trusted: bool) -> Device {
        Device {
            id: uuid::Uuid::new_v4().to_string(),
            name: "HostA".to_string(),
            public_key: "c3BraQ==".to_string(),
            certificate_fingerprint: fingerprint.to_string(),
            last_seen: 0,
            is_trusted: trusted,
            fallback_address: None,
        }
    }

    fn verify(
        verifier: &PinnedCertVerifier,
        der: &CertificateDer<'_>,
    ) -> Result<ServerCertVerified, rustls::Error> {
        verifier.verify_server_cert(
            der,
            &[],
            &ServerName::try_from("192.168.1.10").unwrap(),
            &[],
            UnixTime::now(),
        )
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = certificate_fingerprint(b"der bytes");
        assert!(fp.starts_with("SHA256:"));
        assert_eq!(fp.len(), 7 + 64);
        assert_eq!(fp, format!("SHA256:{}", sha256_hex_upper(b"der bytes")));
    }

    #[tokio::test]
    async fn test_pinned_certificate_accepted() {
        let (_dir, trust) = test_trust_store();
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let der = cert.cert.der().clone();

        trust
            .insert(device_pinning(&certificate_fingerprint(der.as_ref()), true))
            .await
            .unwrap();

        assert!(verify(&verifier(trust), &der).is_ok());
    }

    #[tokio::test]
    async fn test_unpinned_certificate_rejected() {
        let (_dir, trust) = test_trust_store();
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        assert!(verify(&verifier(trust), cert.cert.der()).is_err());
    }

    #[tokio::test]
    async fn test_untrusted_device_pin_rejected() {
        let (_dir, trust) = test_trust_store();
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let der = cert.cert.der().clone();

        trust
            .insert(device_pinning(&certificate_fingerprint(der.as_ref()), false))
            .await
            .unwrap();

        assert!(verify(&verifier(trust), &der).is_err());
    }

    #[tokio::test]
    async fn test_rotated_certificate_rejected() {
        let (_dir, trust) = test_trust_store();
        let pinned = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let rotated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        trust
            .insert(device_pinning(
                &certificate_fingerprint(pinned.cert.der().as_ref()),
                true,
            ))
            .await
            .unwrap();

        assert!(verify(&verifier(trust.clone()), rotated.cert.der()).is_err());
        assert!(verify(&verifier(trust), pinned.cert.der()).is_ok());
    }
}
