use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    config::VaultConfig,
    error::{Result, VaultError},
    fs,
};

/// Raw key length for XChaCha20-Poly1305.
pub const KEY_LEN: usize = 32;

/// Symmetric key material. Never leaves the key file and this process.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub(crate) fn random() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        getrandom::getrandom(&mut bytes).map_err(VaultError::Entropy)?;
        Ok(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Owns the key file: generates, loads and deletes the vault key.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            path: config.key_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates fresh key material and persists it, replacing any existing key.
    ///
    /// Anything sealed under the previous key becomes unreadable.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn generate(&self) -> Result<EncryptionKey> {
        let key = EncryptionKey::random()?;
        fs::write_atomic(&self.path, key.as_bytes())
            .inspect_err(|e| tracing::error!(error = %e, "Failed to persist key"))?;
        tracing::debug!("Generated new vault key");
        Ok(key)
    }

    /// Loads the key, `Ok(None)` when the key file does not exist.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<EncryptionKey>> {
        let Some(bytes) = fs::read_optional(&self.path)? else {
            return Ok(None);
        };

        let key: [u8; KEY_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| VaultError::CorruptKey {
                    path: self.path.clone(),
                    reason: format!("expected {KEY_LEN} bytes, found {}", bytes.len()),
                })?;

        Ok(Some(EncryptionKey(key)))
    }

    /// Removes the key file. Succeeds when it is already gone.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn delete(&self) -> Result<()> {
        if fs::remove_if_exists(&self.path)? {
            tracing::debug!("Deleted vault key");
        }
        Ok(())
    }
}
