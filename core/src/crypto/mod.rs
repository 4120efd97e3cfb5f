//! Cryptographic primitives for AppConnect
//!
//! - AES-256-GCM for the payload envelope and at-rest clipboard content
//! - RSA-OAEP-SHA256 for wrapping the per-connection session key
//! - SHA-256 for content hashes and certificate fingerprints

pub mod b64;
mod encryption;
mod keywrap;

pub use encryption::{sha256_hex_upper, AeadKey, IV_LEN, KEY_LEN};
pub use keywrap::{IdentityKeyPair, PeerPublicKey};
