use thiserror::Error;

/// AppConnect error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed QR payload: {0}")]
    QrMalformed(String),

    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Server certificate is not pinned by any trusted device")]
    CertUntrusted,

    #[error("Session key wrap failed: {0}")]
    WrapFail(String),

    #[error("Session key unwrap failed: {0}")]
    UnwrapFail(String),

    #[error("Key exchange rejected by peer: {0}")]
    HandshakeRejected(String),

    #[error("Payload failed authentication")]
    DecryptAuth,

    #[error("Send failed: {0}")]
    SendFail(String),

    #[error("Content type not supported on this transport: {0}")]
    ContentUnsupported(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Failed to serialize/deserialize: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
