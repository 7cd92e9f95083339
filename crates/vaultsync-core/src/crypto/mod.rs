//! Vault blob sealing.
//!
//! The sync engine only ever sees plaintext `VaultSnapshot`s. Everything sent
//! to or received from the server goes through a `VaultCipher`, whose key is
//! supplied by the caller and never inspected here.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use thiserror::Error;

use crate::models::VaultSnapshot;

const BLOB_MAGIC: &[u8] = b"VSV1";
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("vault blob is malformed")]
    MalformedBlob,
    #[error("vault blob failed authentication")]
    Authentication,
    #[error("failed to gather nonce entropy: {0}")]
    Entropy(String),
    #[error("vault document is invalid: {0}")]
    Document(#[from] serde_json::Error),
}

/// Authenticated encryption of opaque vault blobs.
pub trait VaultCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;
    fn open(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// XChaCha20-Poly1305 with a random nonce per blob.
///
/// Blob layout: `VSV1` magic, 24-byte nonce, ciphertext with tag.
#[derive(Clone)]
pub struct XChaChaVaultCipher {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for XChaChaVaultCipher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("XChaChaVaultCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl XChaChaVaultCipher {
    pub const fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Build a cipher from a 64 character hex key.
    pub fn from_hex(encoded: &str) -> Result<Self, CipherError> {
        let encoded = encoded.trim();
        if encoded.len() != KEY_LEN * 2 {
            return Err(CipherError::InvalidKey(format!(
                "expected {} hex characters, got {}",
                KEY_LEN * 2,
                encoded.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        hex::decode_to_slice(encoded, &mut key)
            .map_err(|error| CipherError::InvalidKey(error.to_string()))?;
        Ok(Self::new(key))
    }
}

impl VaultCipher for XChaChaVaultCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|e| CipherError::Entropy(e.to_string()))?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::Authentication)?;

        let mut blob = Vec::with_capacity(BLOB_MAGIC.len() + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(BLOB_MAGIC);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn open(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError> {
        let body = blob
            .strip_prefix(BLOB_MAGIC)
            .ok_or(CipherError::MalformedBlob)?;
        if body.len() < NONCE_LEN {
            return Err(CipherError::MalformedBlob);
        }
        let (nonce, ciphertext) = body.split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Authentication)
    }
}

/// Serializes vault snapshots and seals them with a cipher.
pub struct VaultCodec<C> {
    cipher: C,
}

impl<C: VaultCipher> VaultCodec<C> {
    pub const fn new(cipher: C) -> Self {
        Self { cipher }
    }

    pub fn encode(&self, vault: &VaultSnapshot) -> Result<Vec<u8>, CipherError> {
        let plaintext = serde_json::to_vec(vault)?;
        self.cipher.seal(&plaintext)
    }

    pub fn decode(&self, blob: &[u8]) -> Result<VaultSnapshot, CipherError> {
        let plaintext = self.cipher.open(blob)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
