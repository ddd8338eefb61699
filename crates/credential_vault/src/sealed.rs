//! On-disk format of a sealed credential:
//!
//! ```text
//! [version: u8][nonce: 24 bytes][ciphertext || poly1305 tag]
//! ```
//!
//! The version byte is bound into the associated data, so it cannot be
//! swapped without failing authentication.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};

use crate::{
    error::{Result, VaultError},
    keystore::EncryptionKey,
};

const VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;
const CONTEXT: &[u8] = b"summary-pulse/credential";

fn associated_data(version: u8) -> Vec<u8> {
    let mut ad = Vec::with_capacity(CONTEXT.len() + 1);
    ad.extend_from_slice(CONTEXT);
    ad.push(version);
    ad
}

fn cipher(key: &EncryptionKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub(crate) fn seal(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce).map_err(VaultError::Entropy)?;

    let ciphertext = cipher(key)
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &associated_data(VERSION),
            },
        )
        .map_err(|_| VaultError::Encrypt)?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.push(VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// A parsed, still encrypted credential blob.
#[derive(Debug)]
pub(crate) struct SealedCredential<'a> {
    version: u8,
    nonce: &'a [u8],
    ciphertext: &'a [u8],
}

impl<'a> SealedCredential<'a> {
    /// Checks framing only; says nothing about authenticity.
    pub(crate) fn parse(bytes: &'a [u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(format!(
                "blob is {} bytes, shorter than the {} byte minimum",
                bytes.len(),
                HEADER_LEN + TAG_LEN
            ));
        }

        let version = bytes[0];
        if version != VERSION {
            return Err(format!("unsupported format version {version}"));
        }

        Ok(Self {
            version,
            nonce: &bytes[1..HEADER_LEN],
            ciphertext: &bytes[HEADER_LEN..],
        })
    }

    /// Authenticates and decrypts. Fails for a wrong key or any modified byte.
    pub(crate) fn open(&self, key: &EncryptionKey) -> std::result::Result<Vec<u8>, String> {
        cipher(key)
            .decrypt(
                XNonce::from_slice(self.nonce),
                Payload {
                    msg: self.ciphertext,
                    aad: &associated_data(self.version),
                },
            )
            .map_err(|_| "authentication failed (tampered file or mismatched key)".to_string())
    }
}
