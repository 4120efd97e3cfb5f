//! Payload envelope codec
//!
//! Encrypted clipboard payloads travel as text frames of the form
//! `b64(iv)|b64(ciphertext_with_tag)`. Everything else on the wire is a
//! JSON control frame with a `"type"` discriminator.

use crate::crypto::{b64, AeadKey};
use crate::protocol::control::ControlMessage;
use crate::{Error, Result};

/// A sealed payload as it travels on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encrypt `plaintext` under `key` into a fresh envelope.
    pub fn seal(key: &AeadKey, plaintext: &[u8]) -> Result<Self> {
        let (iv, ciphertext) = key.encrypt(plaintext)?;
        Ok(Self {
            iv: iv.to_vec(),
            ciphertext,
        })
    }

    /// Decrypt the envelope contents.
    pub fn open(&self, key: &AeadKey) -> Result<Vec<u8>> {
        key.decrypt(&self.iv, &self.ciphertext)
    }

    /// Serialize to the textual wire form. Base64 is emitted padded.
    pub fn to_wire(&self) -> String {
        format!("{}|{}", b64::encode(&self.iv), b64::encode(&self.ciphertext))
    }

    /// Parse the textual wire form. Accepts unpadded base64.
    pub fn from_wire(wire: &str) -> Result<Self> {
        let (iv_b64, ct_b64) = wire
            .split_once('|')
            .ok_or_else(|| Error::InvalidMessage("missing envelope separator".to_string()))?;

        if iv_b64.is_empty() || ct_b64.is_empty() {
            return Err(Error::InvalidMessage(
                "empty envelope component".to_string(),
            ));
        }

        let iv = b64::decode(iv_b64)
            .map_err(|e| Error::InvalidMessage(format!("invalid envelope IV: {}", e)))?;
        let ciphertext = b64::decode(ct_b64)
            .map_err(|e| Error::InvalidMessage(format!("invalid envelope ciphertext: {}", e)))?;

        if iv.len() != crate::crypto::IV_LEN {
            return Err(Error::InvalidMessage(format!(
                "envelope IV is {} bytes, expected {}",
                iv.len(),
                crate::crypto::IV_LEN
            )));
        }

        Ok(Self { iv, ciphertext })
    }
}

/// A classified inbound frame.
#[derive(Debug)]
pub enum Frame {
    /// An encrypted clipboard payload
    Encrypted(Envelope),
    /// A recognized control frame
    Control(ControlMessage),
    /// A JSON frame with an unrecognized `type`; logged and ignored
    Unknown(serde_json::Value),
}

/// Classify a raw inbound buffer.
///
/// A buffer that contains `|` and does not parse as JSON is an encrypted
/// envelope; anything that parses as JSON is a control frame. Everything
/// else is malformed and the caller drops it.
pub fn classify(raw: &str) -> Result<Frame> {
    let json: std::result::Result<serde_json::Value, _> = serde_json::from_str(raw);

    match json {
        Err(_) if raw.contains('|') => Envelope::from_wire(raw).map(Frame::Encrypted),
        Err(_) => Err(Error::InvalidMessage("unclassifiable frame".to_string())),
        Ok(value) => match serde_json::from_value::<ControlMessage>(value.clone()) {
            Ok(control) => Ok(Frame::Control(control)),
            Err(_) => Ok(Frame::Unknown(value)),
        },
    }
}
