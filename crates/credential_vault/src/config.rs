use std::path::PathBuf;

/// Where the vault keeps its two files.
///
/// Both files always live in the same directory; only their names are
/// configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub dir: PathBuf,
    pub key_file_name: String,
    pub credential_file_name: String,
}

impl VaultConfig {
    pub const DEFAULT_KEY_FILE: &'static str = "api_key.key";
    pub const DEFAULT_CREDENTIAL_FILE: &'static str = "encrypted_api_key.bin";
    const APP_DIR: &'static str = "summary-pulse";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            key_file_name: Self::DEFAULT_KEY_FILE.into(),
            credential_file_name: Self::DEFAULT_CREDENTIAL_FILE.into(),
        }
    }

    /// `<config dir>/summary-pulse`, or `None` on platforms without a config dir.
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join(Self::APP_DIR)))
    }

    pub fn with_key_file_name(mut self, name: impl Into<String>) -> Self {
        self.key_file_name = name.into();
        self
    }

    pub fn with_credential_file_name(mut self, name: impl Into<String>) -> Self {
        self.credential_file_name = name.into();
        self
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.join(&self.key_file_name)
    }

    pub fn credential_path(&self) -> PathBuf {
        self.dir.join(&self.credential_file_name)
    }
}
