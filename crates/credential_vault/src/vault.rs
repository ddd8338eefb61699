use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    config::VaultConfig,
    error::{Result, VaultError},
    fs,
    keystore::KeyStore,
    sealed::{self, SealedCredential},
};

/// A decrypted API credential.
///
/// `Debug` is redacted and there is no `Display`; use [`Credential::expose`]
/// at the point where the secret is actually needed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Summary of what is on disk, for front ends deciding what to prompt for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    Present,
    Absent,
    Corrupt,
}

/// Encrypts one credential into the sealed-credential file using the key
/// managed by [`KeyStore`].
///
/// Writing a credential always rotates the key as well; there is no way to
/// replace the credential while keeping the old key.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    keys: KeyStore,
    sealed_path: PathBuf,
}

impl CredentialVault {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            keys: KeyStore::new(config),
            sealed_path: config.credential_path(),
        }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    pub fn sealed_path(&self) -> &Path {
        &self.sealed_path
    }

    fn corrupt_credential(&self, reason: impl Into<String>) -> VaultError {
        VaultError::CorruptCredential {
            path: self.sealed_path.clone(),
            reason: reason.into(),
        }
    }

    /// Returns the stored credential.
    ///
    /// `Ok(None)` when either file is missing. A file that is present is still
    /// validated first, so a damaged key or blob is reported even when its
    /// counterpart is gone.
    #[tracing::instrument(skip(self))]
    pub fn get_stored(&self) -> Result<Option<Credential>> {
        let key = self.keys.load()?;
        let blob = fs::read_optional(&self.sealed_path)?;

        let sealed = blob
            .as_deref()
            .map(SealedCredential::parse)
            .transpose()
            .map_err(|reason| self.corrupt_credential(reason))?;

        let (Some(key), Some(sealed)) = (key, sealed) else {
            tracing::debug!("No complete key/credential pair on disk");
            return Ok(None);
        };

        let plaintext = sealed
            .open(&key)
            .map_err(|reason| self.corrupt_credential(reason))
            .inspect_err(|e| tracing::warn!(error = %e, "Stored credential failed to open"))?;

        let secret = String::from_utf8(plaintext)
            .map_err(|_| self.corrupt_credential("plaintext is not valid UTF-8"))?;

        Ok(Some(Credential(secret)))
    }

    /// Seals `plain` under a freshly generated key and persists both files.
    ///
    /// The previous blob is removed before the key is rotated, so an
    /// interrupted store leaves the vault absent rather than mismatched.
    #[tracing::instrument(skip_all)]
    pub fn store(&self, plain: &str) -> Result<Credential> {
        let secret = plain.trim();
        if secret.is_empty() {
            return Err(VaultError::EmptyCredential);
        }

        fs::remove_if_exists(&self.sealed_path)?;
        let key = self.keys.generate()?;
        let blob = sealed::seal(&key, secret.as_bytes())?;
        fs::write_atomic(&self.sealed_path, &blob)
            .inspect_err(|e| tracing::error!(error = %e, "Failed to persist sealed credential"))?;

        tracing::info!(path = %self.sealed_path.display(), "Stored credential");
        Ok(Credential(secret.to_owned()))
    }

    /// Removes both files. Succeeds if either or both were already absent.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self) -> Result<()> {
        let removed = fs::remove_if_exists(&self.sealed_path)?;
        self.keys.delete()?;
        tracing::info!(removed, "Deleted stored credential");
        Ok(())
    }

    /// Classifies the vault without handing the secret out.
    ///
    /// Storage errors are still returned as errors.
    pub fn status(&self) -> Result<VaultStatus> {
        match self.get_stored() {
            Ok(Some(_)) => Ok(VaultStatus::Present),
            Ok(None) => Ok(VaultStatus::Absent),
            Err(e) if e.is_corrupt() => Ok(VaultStatus::Corrupt),
            Err(e) => Err(e),
        }
    }

    /// Loads the credential, asking `prompt` for one only when none is stored.
    ///
    /// Returns `Ok(None)` when the prompt declines. Corrupt stores are returned
    /// as errors instead of being silently replaced.
    pub fn get_or_store<F>(&self, prompt: F) -> Result<Option<Credential>>
    where
        F: FnOnce() -> Option<String>,
    {
        if let Some(credential) = self.get_stored()? {
            return Ok(Some(credential));
        }

        match prompt() {
            Some(entered) => self.store(&entered).map(Some),
            None => Ok(None),
        }
    }
}
