//! Plaintext control frames
//!
//! Control traffic is JSON with a `"type"` discriminator, never encrypted.
//! Unknown types are surfaced to the caller as `Frame::Unknown` by the
//! envelope classifier.

use serde::{Deserialize, Serialize};

use crate::protocol::item::now_ms;

/// Key exchange ack status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// All recognized control frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Session key offer, sent once right after the transport opens
    KeyExchange { encrypted_key: String },

    /// Peer's verdict on the key exchange
    KeyExchangeAck {
        status: AckStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Non-fatal failure report, best-effort
    ErrorReport {
        error_type: String,
        message: String,
        timestamp: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },

    /// Connection health traffic, observability only
    ConnectionStatus {
        status: String,
        timestamp: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stats: Option<serde_json::Value>,
    },

    /// Receipt for an inbound clipboard item, best-effort
    ClipboardSyncResult {
        success: bool,
        clipboard_id: String,
        message: String,
        timestamp: i64,
    },
}

impl ControlMessage {
    pub fn error_report(error_type: &str, message: &str) -> Self {
        ControlMessage::ErrorReport {
            error_type: error_type.to_string(),
            message: message.to_string(),
            timestamp: now_ms(),
            details: None,
        }
    }

    pub fn sync_result(success: bool, clipboard_id: &str, message: &str) -> Self {
        ControlMessage::ClipboardSyncResult {
            success,
            clipboard_id: clipboard_id.to_string(),
            message: message.to_string(),
            timestamp: now_ms(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
