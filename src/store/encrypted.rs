//! Encrypted store
//!
//! Wraps a [`KeyValueStore`] with AES-256-GCM so that values such as auth
//! tokens are only ever persisted as ciphertext. The ciphertext is stored
//! hex-encoded as the envelope value with the `encrypted` flag set.

use std::fmt;
use std::time::Duration;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::store::{KeyValueStore, SetOptions};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

// == Encryption Key ==
/// A 256-bit key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Generates a random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            StorageError::Encryption(format!(
                "Invalid key length {}; expected {} bytes for AES-256",
                bytes.len(),
                KEY_LEN
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| StorageError::Encryption(format!("Invalid hex key: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

// == Encrypted Store ==
#[derive(Debug, Clone)]
pub struct EncryptedStore {
    inner: KeyValueStore,
    key: Option<EncryptionKey>,
}

impl EncryptedStore {
    pub fn new(inner: KeyValueStore, key: Option<EncryptionKey>) -> Self {
        Self { inner, key }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    fn key(&self) -> Result<&EncryptionKey> {
        self.key.as_ref().ok_or(StorageError::NotConfigured)
    }

    /// Encrypts and stores `value`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let plaintext = serde_json::to_vec(value)?;
        let sealed = seal(self.key()?, &plaintext)?;
        self.inner.set(
            key,
            &sealed,
            SetOptions {
                ttl,
                encrypted: true,
            },
        )
    }

    /// Reads and decrypts the value under `key`.
    ///
    /// Entries written without encryption are returned as stored.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let cipher_key = self.key()?;
        let Some(entry) = self.inner.read_entry(key)? else {
            return Ok(None);
        };

        if !entry.encrypted {
            debug!("Entry '{}' is not encrypted; returning it as stored", key);
            return Ok(Some(serde_json::from_value(entry.value)?));
        }

        let Value::String(sealed) = entry.value else {
            return Err(StorageError::Encryption(format!(
                "Encrypted entry '{}' does not hold ciphertext",
                key
            )));
        };
        let plaintext = open(cipher_key, &sealed)?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        self.inner.has(key)
    }
}

/// Encrypts to hex(nonce || ciphertext || tag).
fn seal(key: &EncryptionKey, plaintext: &[u8]) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| StorageError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(hex::encode(sealed))
}

fn open(key: &EncryptionKey, sealed: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(sealed)
        .map_err(|e| StorageError::Encryption(format!("Ciphertext is not hex: {}", e)))?;
    if bytes.len() < NONCE_LEN + TAG_LEN {
        return Err(StorageError::Encryption(
            "Invalid ciphertext: too short".to_string(),
        ));
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| StorageError::Encryption(format!("Decryption failed: {}", e)))
}
