use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Key file {} is corrupt: {}", .path.display(), .reason)]
    CorruptKey { path: PathBuf, reason: String },

    #[error("Sealed credential {} could not be opened: {}", .path.display(), .reason)]
    CorruptCredential { path: PathBuf, reason: String },

    #[error("Storage error on {}: {}", .path.display(), .source)]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential must not be empty")]
    EmptyCredential,

    #[error("Failed to gather entropy: {0}")]
    Entropy(#[source] getrandom::Error),

    #[error("Failed to seal credential")]
    Encrypt,
}

impl VaultError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// True for the two variants that mean "the files exist but cannot be trusted".
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::CorruptKey { .. } | Self::CorruptCredential { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
