use std::path::PathBuf;
use thiserror::Error;

use crate::vault::VaultError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("required config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("duplicate configuration key '{0}'")]
    DuplicateKey(String),

    /// A value kind outside {object, array, string, number, boolean, null}.
    ///
    /// Unreachable when the document comes from `serde_json`, whose value
    /// model is closed over exactly those kinds; retained for callers that
    /// feed in documents from other front ends.
    #[error("unsupported value kind '{kind}' at '{key}'")]
    UnsupportedValue { key: String, kind: String },

    #[error("malformed protected value at '{key}': {source}")]
    InvalidEnvelope {
        key: String,
        source: base64::DecodeError,
    },

    #[error("failed to decrypt secret '{key}': {source}")]
    DecryptError { key: String, source: VaultError },

    #[error("failed to encrypt secret '{key}': {source}")]
    EncryptError { key: String, source: VaultError },

    #[error("secret '{0}' did not decrypt to UTF-8 text")]
    NotUtf8(String),

    #[error("'{0}' is marked secret but no cipher is configured")]
    MissingCipher(String),

    #[error("failed to bind configuration: {0}")]
    BindError(#[from] serde_json::Error),
}
