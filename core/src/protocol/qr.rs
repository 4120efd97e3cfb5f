//! Pairing QR payload
//!
//! The desktop peer renders a compact JSON object with short field names;
//! scanning it is the out-of-band trust anchor. All five fields are
//! required, extra fields are ignored.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Decoded QR payload: `{"n":..,"ip":..,"p":..,"k":..,"fp":"SHA256:.."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    /// Display name of the peer
    #[serde(rename = "n")]
    pub name: String,
    /// IPv4 address to connect to
    pub ip: String,
    /// WebSocket port
    #[serde(rename = "p")]
    pub port: u16,
    /// Base64 of the peer's SubjectPublicKeyInfo (RSA, ≥2048-bit)
    #[serde(rename = "k")]
    pub public_key: String,
    /// Pinned TLS leaf fingerprint, `SHA256:` + uppercase hex
    #[serde(rename = "fp")]
    pub certificate_fingerprint: String,
}

impl QrPayload {
    /// Decode the scanned QR text.
    pub fn decode(text: &str) -> Result<Self> {
        let payload: QrPayload =
            serde_json::from_str(text).map_err(|e| Error::QrMalformed(e.to_string()))?;

        if !payload.certificate_fingerprint.starts_with("SHA256:") {
            return Err(Error::QrMalformed(
                "fingerprint missing SHA256: prefix".to_string(),
            ));
        }

        Ok(payload)
    }

    /// Encode as the compact JSON a peer would render into a QR code.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"n":"HostA","ip":"192.168.1.10","p":8765,"k":"c3BraQ==","fp":"SHA256:ABCD"}"#;

    #[test]
    fn test_decode_sample() {
        let qr = QrPayload::decode(SAMPLE).unwrap();

        assert_eq!(qr.name, "HostA");
        assert_eq!(qr.ip, "192.168.1.10");
        assert_eq!(qr.port, 8765);
        assert_eq!(qr.public_key, "c3BraQ==");
        assert_eq!(qr.certificate_fingerprint, "SHA256:ABCD");
    }

    #[test]
    fn test_missing_field_rejected() {
        let raw = r#"{"n":"HostA","ip":"192.168.1.10","p":8765,"k":"c3BraQ=="}"#;
        assert!(matches!(
            QrPayload::decode(raw),
            Err(Error::QrMalformed(_))
        ));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let raw = r#"{"n":"A","ip":"10.0.0.1","p":1,"k":"eA==","fp":"SHA256:00","v":2}"#;
        assert!(QrPayload::decode(raw).is_ok());
    }

    #[test]
    fn test_bad_fingerprint_prefix_rejected() {
        let raw = r#"{"n":"A","ip":"10.0.0.1","p":1,"k":"eA==","fp":"MD5:00"}"#;
        assert!(matches!(
            QrPayload::decode(raw),
            Err(Error::QrMalformed(_))
        ));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(matches!(
            QrPayload::decode("appconnect://pair?x=1"),
            Err(Error::QrMalformed(_))
        ));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let qr = QrPayload::decode(SAMPLE).unwrap();
        let encoded = qr.encode().unwrap();
        assert_eq!(QrPayload::decode(&encoded).unwrap(), qr);
    }
}
