//! Symmetric encryption using AES-256-GCM

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// AES-GCM nonce length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit AEAD key.
///
/// Two instances exist at runtime: the per-connection session key (memory
/// only, dropped when the transport disconnects) and the device-bound
/// at-rest key protecting stored clipboard content.
#[derive(Clone)]
pub struct AeadKey {
    cipher: Aes256Gcm,
    bytes: [u8; KEY_LEN],
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadKey").finish_non_exhaustive()
    }
}

impl AeadKey {
    /// Generate a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(&bytes)
    }

    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        let cipher = Aes256Gcm::new_from_slice(bytes).expect("32 bytes is a valid key length");
        Self {
            cipher,
            bytes: *bytes,
        }
    }

    /// Raw key material, needed when wrapping the key for a peer.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Encrypt with a fresh random 12-byte IV.
    ///
    /// Returns the IV and the ciphertext with the 16-byte GCM tag appended.
    /// No associated data.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>)> {
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| Error::DecryptAuth)?;

        Ok((iv, ciphertext))
    }

    /// Decrypt ciphertext-with-tag under the given IV.
    ///
    /// Fails with `DecryptAuth` if the tag does not verify or the IV has
    /// the wrong length.
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if iv.len() != IV_LEN {
            return Err(Error::DecryptAuth);
        }
        let nonce = Nonce::from_slice(iv);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::DecryptAuth)
    }
}

/// SHA-256 of `data` as 64 uppercase hex characters.
pub fn sha256_hex_upper(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = AeadKey::generate();
        let plaintext = b"hello clipboard";

        let (iv, ciphertext) = key.encrypt(plaintext).unwrap();
        let decrypted = key.decrypt(&iv, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = AeadKey::generate();
        let plaintext = b"same message";

        let (iv1, ct1) = key.encrypt(plaintext).unwrap();
        let (iv2, ct2) = key.encrypt(plaintext).unwrap();

        assert_ne!(iv1, iv2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_tampered_ciphertext_fails_auth() {
        let key = AeadKey::generate();
        let (iv, mut ciphertext) = key.encrypt(b"payload").unwrap();

        ciphertext[0] ^= 0x01;
        assert!(matches!(
            key.decrypt(&iv, &ciphertext),
            Err(Error::DecryptAuth)
        ));
    }

    #[test]
    fn test_tampered_iv_fails_auth() {
        let key = AeadKey::generate();
        let (mut iv, ciphertext) = key.encrypt(b"payload").unwrap();

        iv[0] ^= 0x01;
        assert!(matches!(
            key.decrypt(&iv, &ciphertext),
            Err(Error::DecryptAuth)
        ));
    }

    #[test]
    fn test_wrong_iv_length_rejected() {
        let key = AeadKey::generate();
        let (_, ciphertext) = key.encrypt(b"payload").unwrap();

        assert!(matches!(
            key.decrypt(&[0u8; 11], &ciphertext),
            Err(Error::DecryptAuth)
        ));
    }

    #[test]
    fn test_wrong_key_fails_auth() {
        let key = AeadKey::generate();
        let other = AeadKey::generate();
        let (iv, ciphertext) = key.encrypt(b"payload").unwrap();

        assert!(other.decrypt(&iv, &ciphertext).is_err());
    }

    #[test]
    fn test_sha256_hex_upper_format() {
        let hash = sha256_hex_upper(b"hello");
        assert_eq!(hash.len(), 64);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(
            hash,
            "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824"
        );
    }

    #[test]
    fn test_sha256_stable() {
        assert_eq!(sha256_hex_upper(b"x"), sha256_hex_upper(b"x"));
    }
}
