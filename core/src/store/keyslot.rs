//! Device-bound at-rest key storage
//!
//! The key that protects stored clipboard content must survive restarts,
//! so it lives as a restricted-permission file in the app data directory.
//! It is distinct from the per-session key and is never transmitted.

use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::{AeadKey, KEY_LEN};
use crate::{Error, Result};

const KEY_FILE: &str = "atrest.v1.key";

/// File-backed slot for the at-rest AEAD key.
pub struct KeySlotStore {
    path: PathBuf,
}

impl KeySlotStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            path: base_dir.join(KEY_FILE),
        }
    }

    /// Load the stored key, generating and persisting a fresh one on first
    /// use. A corrupt slot is treated as absent; stale items encrypted
    /// under the lost key will surface as the store's decrypt sentinel.
    pub fn load_or_generate(&self) -> Result<AeadKey> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.len() == KEY_LEN => {
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(&bytes);
                return Ok(AeadKey::from_bytes(&key));
            }
            Ok(_) => {
                tracing::warn!("at-rest key slot is corrupt, regenerating");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        let key = AeadKey::generate();
        self.persist(key.as_bytes())?;
        Ok(key)
    }

    fn persist(&self, bytes: &[u8; KEY_LEN]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_then_reloads_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let slot = KeySlotStore::new(dir.path());

        let first = slot.load_or_generate().unwrap();
        let second = slot.load_or_generate().unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_corrupt_slot_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let slot = KeySlotStore::new(dir.path());

        fs::write(dir.path().join(KEY_FILE), b"short").unwrap();
        assert!(slot.load_or_generate().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let slot = KeySlotStore::new(dir.path());
        slot.load_or_generate().unwrap();

        let mode = fs::metadata(dir.path().join(KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
