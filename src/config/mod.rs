//! Secure JSON configuration loading.

mod bind;
mod builder;
mod error;
mod file;
mod flatten;
mod secret;

pub use builder::{Config, Settings};
pub use error::ConfigError;
pub use file::find_override_config;
