//! RSA-OAEP session key wrapping
//!
//! The pairing QR carries the peer's long-term RSA public key as base64 of
//! the X.509 SubjectPublicKeyInfo. The 32-byte session key is wrapped with
//! RSA-OAEP using SHA-256 for both the hash and the MGF1 mask function.

use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::crypto::b64;
use crate::crypto::KEY_LEN;
use crate::{Error, Result};

const RSA_BITS: usize = 2048;

/// A peer's long-term RSA public key (≥2048-bit).
#[derive(Clone)]
pub struct PeerPublicKey {
    inner: RsaPublicKey,
}

impl std::fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPublicKey").finish_non_exhaustive()
    }
}

impl PeerPublicKey {
    /// Parse from DER-encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| Error::InvalidMessage(format!("invalid public key: {}", e)))?;
        Ok(Self { inner })
    }

    /// Parse from the base64 SPKI form used in the QR payload.
    pub fn from_base64_spki(encoded: &str) -> Result<Self> {
        let der = b64::decode(encoded)
            .map_err(|e| Error::InvalidMessage(format!("invalid public key base64: {}", e)))?;
        Self::from_spki_der(&der)
    }

    /// Export as the base64 SPKI form.
    pub fn to_base64_spki(&self) -> Result<String> {
        let der = self
            .inner
            .to_public_key_der()
            .map_err(|e| Error::InvalidMessage(format!("public key encoding failed: {}", e)))?;
        Ok(b64::encode(der.as_bytes()))
    }

    /// Wrap a session key for this peer.
    pub fn wrap_session_key(&self, key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
        self.inner
            .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), key)
            .map_err(|e| Error::WrapFail(e.to_string()))
    }
}

/// An RSA keypair playing the responder role of the key exchange.
///
/// The mobile client only ever wraps keys for a peer, but tests and a
/// desktop listener need the private half to unwrap them.
pub struct IdentityKeyPair {
    inner: RsaPrivateKey,
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair").finish_non_exhaustive()
    }
}

impl IdentityKeyPair {
    /// Generate a fresh RSA-2048 keypair.
    pub fn generate() -> Result<Self> {
        let inner = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_BITS)
            .map_err(|e| Error::WrapFail(format!("key generation failed: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn public_key(&self) -> PeerPublicKey {
        PeerPublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    /// Export the private half as PKCS#8 DER, for persistence.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| Error::InvalidMessage(format!("private key encoding failed: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Unwrap a session key wrapped with our public key.
    ///
    /// Fails with `UnwrapFail` on padding errors or when the result is not
    /// exactly 32 bytes.
    pub fn unwrap_session_key(&self, wrapped: &[u8]) -> Result<[u8; KEY_LEN]> {
        let plain = self
            .inner
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|e| Error::UnwrapFail(e.to_string()))?;

        plain
            .try_into()
            .map_err(|_| Error::UnwrapFail("unexpected session key length".to_string()))
    }
}
