//! Clipboard item model
//!
//! The JSON field names are the camelCase wire names every paired peer
//! speaks; they also name the columns of the `clipboard_items` table.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::sha256_hex_upper;
use crate::protocol::constants::DEFAULT_TTL_MS;

/// Clipboard content classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    Text,
    Image,
    File,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Text => write!(f, "TEXT"),
            ContentType::Image => write!(f, "IMAGE"),
            ContentType::File => write!(f, "FILE"),
        }
    }
}

/// A single clipboard entry, local or received from a peer.
///
/// `content` is plaintext in memory; the store encrypts it at rest and the
/// envelope codec encrypts it on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardItem {
    pub id: String,
    pub content: String,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    pub timestamp: i64,
    pub ttl: i64,
    pub synced: bool,
    #[serde(rename = "sourceDeviceId")]
    pub source_device_id: Option<String>,
    pub hash: String,
}

impl ClipboardItem {
    /// Create a TEXT item from local clipboard content.
    pub fn new_text(content: &str, source_device_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            content_type: ContentType::Text,
            timestamp: now_ms(),
            ttl: DEFAULT_TTL_MS,
            synced: false,
            source_device_id,
            hash: sha256_hex_upper(content.as_bytes()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Current wall-clock time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
