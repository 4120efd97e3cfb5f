//! Session key establishment
//!
//! Runs exactly once per transport connection, immediately after the
//! transport opens and before any clipboard frame is sent or accepted.
//! The initiator picks 32 CSPRNG bytes, wraps them with the peer's
//! long-term RSA key and waits for the ack; the responder unwraps and
//! confirms. The resulting AEAD key lives in memory only.

use crate::crypto::{b64, AeadKey, IdentityKeyPair, PeerPublicKey};
use crate::protocol::{classify, AckStatus, ControlMessage, Frame};
use crate::{Error, Result};

/// Start the exchange: generate a fresh session key and the
/// `key_exchange` frame carrying its wrapped form.
pub fn initiate(peer: &PeerPublicKey) -> Result<(AeadKey, String)> {
    let key = AeadKey::generate();
    let wrapped = peer.wrap_session_key(key.as_bytes())?;

    let frame = ControlMessage::KeyExchange {
        encrypted_key: b64::encode(&wrapped),
    }
    .to_json()?;

    Ok((key, frame))
}

/// Interpret the peer's answer to our `key_exchange`.
///
/// Only a `key_exchange_ack` is legal in this window; any other frame is
/// a protocol violation and the caller closes with policy-violation.
pub fn complete(raw: &str) -> Result<()> {
    match classify(raw) {
        Ok(Frame::Control(ControlMessage::KeyExchangeAck { status, message })) => match status {
            AckStatus::Ok => Ok(()),
            AckStatus::Error => Err(Error::HandshakeRejected(
                message.unwrap_or_else(|| "peer rejected key exchange".to_string()),
            )),
        },
        Ok(_) => Err(Error::InvalidMessage(
            "unexpected frame during key exchange".to_string(),
        )),
        Err(e) => Err(e),
    }
}

/// Responder side: unwrap the offered session key and produce the ack.
pub fn respond(raw: &str, identity: &IdentityKeyPair) -> Result<(AeadKey, String)> {
    let encrypted_key = match classify(raw) {
        Ok(Frame::Control(ControlMessage::KeyExchange { encrypted_key })) => encrypted_key,
        Ok(_) => {
            return Err(Error::InvalidMessage(
                "expected key_exchange frame".to_string(),
            ))
        }
        Err(e) => return Err(e),
    };

    let wrapped = b64::decode(&encrypted_key)
        .map_err(|e| Error::UnwrapFail(format!("invalid wrapped key base64: {}", e)))?;
    let key_bytes = identity.unwrap_session_key(&wrapped)?;

    let ack = ControlMessage::KeyExchangeAck {
        status: AckStatus::Ok,
        message: None,
    }
    .to_json()?;

    Ok((AeadKey::from_bytes(&key_bytes), ack))
}

/// The ack frame sent when the exchange fails on the responder side.
pub fn error_ack(message: &str) -> String {
    ControlMessage::KeyExchangeAck {
        status: AckStatus::Error,
        message: Some(message.to_string()),
    }
    .to_json()
    .unwrap_or_else(|_| r#"{"type":"key_exchange_ack","status":"error"}"#.to_string())
}
