use crate::config::ConfigError;
use crate::vault::VaultError;
use thiserror::Error;

/// Top-level error type for the secure-json library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}
