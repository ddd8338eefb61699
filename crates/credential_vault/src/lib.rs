//! # Credential Vault
//!
//! Keeps a single API credential on local disk without storing it in clear
//! text. A random 32-byte key lives in one file and the credential, sealed
//! with XChaCha20-Poly1305 under that key, lives in a second file next to it.
//!
//! Lookups have three outcomes: the credential is present, it was never
//! stored (`Ok(None)`), or the files are damaged or mismatched
//! ([`VaultError::CorruptKey`] / [`VaultError::CorruptCredential`]).
//! I/O failures are reported separately as [`VaultError::Storage`].

mod config;
mod error;
mod fs;
mod keystore;
mod sealed;
mod vault;

pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use keystore::{EncryptionKey, KeyStore, KEY_LEN};
pub use vault::{Credential, CredentialVault, VaultStatus};
