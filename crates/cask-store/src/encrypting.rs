use std::sync::Arc;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Size of a ChaCha20-Poly1305 key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;
/// Size of a ChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// A 256-bit symmetric key for an [`EncryptingStore`].
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a new random key using the OS entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("EncryptionKey(..)")
    }
}

/// A fixed nonce for an [`EncryptingStore`].
#[derive(Clone, Debug)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a new random nonce using the OS entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create a nonce from raw bytes.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Encrypting decorator: ChaCha20-Poly1305 on write, decrypt on read.
///
/// One key and one nonce are fixed at construction and used for every blob
/// the instance touches. That keeps ciphertexts deterministic and the
/// contract simple, but it is a real security caveat: blobs encrypted under
/// the same instance leak content equality, and the key/nonce pair must not
/// be reused across unrelated data sets. Callers needing stronger properties
/// should construct one instance per data set.
///
/// Reading with the wrong key (or tampered ciphertext) fails AEAD
/// authentication and surfaces as [`StoreError::Integrity`], never as
/// garbage plaintext. Empty writes pass through unencrypted so the
/// delete-on-empty convention keeps working.
pub struct EncryptingStore {
    inner: Arc<dyn BlobStore>,
    cipher: ChaCha20Poly1305,
    nonce: Nonce,
}

impl EncryptingStore {
    /// Wrap `inner` with the given fixed key and nonce.
    pub fn new(inner: Arc<dyn BlobStore>, key: EncryptionKey, nonce: Nonce) -> Self {
        let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key.0));
        Self {
            inner,
            cipher,
            nonce,
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        self.cipher
            .encrypt(chacha20poly1305::Nonce::from_slice(&self.nonce.0), plaintext)
            .map_err(|_| StoreError::Integrity("encryption failed".into()))
    }

    fn decrypt(&self, key: &str, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        self.cipher
            .decrypt(chacha20poly1305::Nonce::from_slice(&self.nonce.0), ciphertext)
            .map_err(|_| {
                StoreError::Integrity(format!(
                    "authentication failed for {key}: wrong key or tampered data"
                ))
            })
    }
}

#[async_trait]
impl BlobStore for EncryptingStore {
    async fn list_all(&self) -> StoreResult<Vec<String>> {
        self.inner.list_all().await
    }

    async fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        let ciphertext = self.inner.read(key).await?;
        self.decrypt(key, &ciphertext)
    }

    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        if data.is_empty() {
            // Delete semantics must reach the inner store unencrypted.
            return self.inner.write(key, data).await;
        }
        let ciphertext = self.encrypt(data)?;
        self.inner.write(key, &ciphertext).await
    }
}

impl std::fmt::Debug for EncryptingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptingStore").finish_non_exhaustive()
    }
}
