use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultError {
    #[error("invalid key length; expected 32 bytes")]
    InvalidKeyLength,

    #[error("key source error: {0}")]
    KeySource(String),

    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Capability interface for protecting secret bytes at rest.
///
/// The configuration loader only ever sees this trait, so the concrete
/// backing (a local symmetric key, an OS keychain, a remote KMS) can be
/// swapped without touching the traversal code. Ciphertext produced by one
/// implementation is only expected to be readable by the same
/// implementation configured with the same key material.
pub trait SecretCipher: Send + Sync + std::fmt::Debug {
    /// Encrypts plaintext bytes into an opaque ciphertext blob.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Decrypts a blob previously produced by [`encrypt`](Self::encrypt).
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, VaultError>;
}
