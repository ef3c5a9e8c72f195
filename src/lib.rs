pub mod config;
pub mod vault;
mod error;

pub use config::{find_override_config, Config, ConfigError, Settings};
pub use error::Error;
pub use vault::{KeyVault, SecretCipher, VaultError};
