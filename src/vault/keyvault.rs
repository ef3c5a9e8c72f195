//! Symmetric-key secret cipher built on ChaCha20-Poly1305.
//!
//! Ciphertext blobs are laid out as `nonce || ciphertext+tag` so a secret
//! fits in a single base64 string inside a configuration file. The key is
//! supplied out of band (raw bytes, an environment variable, or a key file)
//! and is zeroed when the vault is dropped.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use super::cipher::{SecretCipher, VaultError};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A [`SecretCipher`] backed by a local 256-bit key.
///
/// Portability of the ciphertext is tied to the key, not the machine:
/// any host configured with the same key file can decrypt the same
/// configuration.
pub struct KeyVault {
    key: Key,
}

impl KeyVault {
    /// Builds a vault from raw key bytes. The key must be exactly 32 bytes.
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, VaultError> {
        if key_bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKeyLength);
        }
        let mut key = Key::default();
        key.copy_from_slice(key_bytes);
        Ok(Self { key })
    }

    /// Reads a base64-encoded key from an environment variable.
    pub fn from_env_var(var: &str) -> Result<Self, VaultError> {
        let encoded =
            std::env::var(var).map_err(|e| VaultError::KeySource(format!("{var}: {e}")))?;
        let decoded = STANDARD.decode(encoded.trim().as_bytes())?;
        Self::from_key_bytes(&decoded)
    }

    /// Reads a base64-encoded key from disk.
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| VaultError::KeySource(format!("{}: {e}", path.display())))?;
        let decoded = STANDARD.decode(content.trim().as_bytes())?;
        Self::from_key_bytes(&decoded)
    }

    /// Generates a vault with a fresh random key.
    ///
    /// The key lives only in this process; anything encrypted with it is
    /// unreadable once the vault is gone. Use
    /// [`generate_key_file`](Self::generate_key_file) when the key must
    /// survive restarts.
    pub fn generate() -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        Self { key }
    }

    /// Generates a fresh key, writes it base64-encoded to `path`, and
    /// returns the vault holding it. Provisioning helper for first-time
    /// setup.
    pub fn generate_key_file(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref();
        let vault = Self::generate();
        let encoded = STANDARD.encode(vault.key.as_slice());
        fs::write(path, encoded)
            .map_err(|e| VaultError::KeySource(format!("{}: {e}", path.display())))?;
        Ok(vault)
    }
}

impl SecretCipher for KeyVault {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let cipher = ChaCha20Poly1305::new(&self.key);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| VaultError::EncryptionFailed(format!("{e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, VaultError> {
        if ciphertext.len() <= NONCE_LEN {
            return Err(VaultError::DecryptionFailed(
                "ciphertext shorter than nonce".to_string(),
            ));
        }
        let (nonce, payload) = ciphertext.split_at(NONCE_LEN);

        let cipher = ChaCha20Poly1305::new(&self.key);
        cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| VaultError::DecryptionFailed(format!("{e}")))
    }
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("KeyVault").finish_non_exhaustive()
    }
}

impl Drop for KeyVault {
    fn drop(&mut self) {
        // Zero the key material on drop to reduce its lifetime in memory.
        self.key.as_mut_slice().zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypts_and_decrypts_round_trip() {
        let vault = KeyVault::from_key_bytes(&[42u8; 32]).expect("key should be valid");
        let blob = vault
            .encrypt(b"secret-token")
            .expect("encryption should succeed");
        let plaintext = vault.decrypt(&blob).expect("decryption should succeed");
        assert_eq!(plaintext, b"secret-token");
    }

    #[test]
    fn rejects_bad_keys() {
        let err = KeyVault::from_key_bytes(&[1u8; 16]).unwrap_err();
        assert!(matches!(err, VaultError::InvalidKeyLength));
    }

    #[test]
    fn rejects_wrong_key() {
        let vault = KeyVault::from_key_bytes(&[7u8; 32]).unwrap();
        let other = KeyVault::from_key_bytes(&[8u8; 32]).unwrap();
        let blob = vault.encrypt(b"payload").unwrap();
        assert!(matches!(
            other.decrypt(&blob),
            Err(VaultError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let vault = KeyVault::from_key_bytes(&[7u8; 32]).unwrap();
        let mut blob = vault.encrypt(b"payload").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(
            vault.decrypt(&blob),
            Err(VaultError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn rejects_truncated_blob() {
        let vault = KeyVault::from_key_bytes(&[7u8; 32]).unwrap();
        assert!(matches!(
            vault.decrypt(&[0u8; NONCE_LEN]),
            Err(VaultError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn round_trips_through_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("vault.key");

        let vault = KeyVault::generate_key_file(&key_path).expect("key file should be written");
        let blob = vault.encrypt(b"hello").unwrap();

        let reloaded = KeyVault::from_key_file(&key_path).expect("key file should load");
        assert_eq!(reloaded.decrypt(&blob).unwrap(), b"hello");
    }

    #[test]
    fn key_file_with_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("vault.key");
        std::fs::write(&key_path, "not base64 at all!").unwrap();

        assert!(matches!(
            KeyVault::from_key_file(&key_path),
            Err(VaultError::Base64(_))
        ));
    }
}
