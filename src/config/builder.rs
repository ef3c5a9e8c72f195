use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::bind;
use super::file::{load_secure_file, FileSource};
use super::flatten::FlatMap;
use super::ConfigError;
use crate::vault::SecretCipher;

/// Builder for loading configuration from secure JSON files.
///
/// Files are loaded in registration order; later files override earlier
/// ones per flattened key. Property names prefixed with `$` mark the values
/// under them as secrets: plaintext secrets found on disk are encrypted
/// through the configured cipher and the file is rewritten, while
/// already-encrypted values are decrypted into memory only.
///
/// ## Example
///
/// ```no_run
/// use secure_json::{Config, KeyVault};
///
/// let settings = Config::builder()
///     .with_file("config/appsettings.json", true)
///     .with_file("config/appsettings.local.json", false)
///     .with_cipher(KeyVault::from_env_var("APP_CONFIG_KEY")?)
///     .build()?;
///
/// let secret = settings.get("Secret");
/// # Ok::<(), secure_json::Error>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct Config {
    sources: Vec<FileSource>,
    cipher: Option<Arc<dyn SecretCipher>>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a JSON file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.sources.push(FileSource {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Injects the cipher used to protect secret values.
    ///
    /// Only needed when a registered file actually contains `$`-marked
    /// keys; a build over plain files works without one.
    pub fn with_cipher(mut self, cipher: impl SecretCipher + 'static) -> Self {
        self.cipher = Some(Arc::new(cipher));
        self
    }

    /// Loads every registered file, decrypting (and where needed,
    /// encrypting and rewriting) secret values along the way.
    ///
    /// Each file is processed independently and completely before the
    /// next; a failure in any file aborts the build with no partial
    /// result.
    pub fn build(self) -> Result<Settings, ConfigError> {
        let cipher = self.cipher.as_deref();
        let mut merged = FlatMap::new();

        for source in &self.sources {
            if let Some(entries) = load_secure_file(&source.path, source.required, cipher)? {
                merged.merge(entries);
            }
        }

        Ok(Settings { entries: merged })
    }
}

/// Loaded configuration: a flat map of `:`-delimited keys to values.
///
/// Keys are marker-free and compared case-insensitively. Empty objects and
/// arrays in the source are present as keys with no value.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    entries: FlatMap,
}

impl Settings {
    /// Looks up a value by its flattened key, case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key)
    }

    /// Looks up a value, falling back to `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.entries.get(key).unwrap_or(default)
    }

    /// Looks up a value and parses it. Returns `None` when the key is
    /// absent or the value doesn't parse as `T`.
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(|value| value.parse().ok())
    }

    /// Whether the key exists, including keys holding an absence marker.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates entries in deterministic (case-folded) key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reassembles the flat entries into a JSON tree and deserializes it
    /// into `T`, coercing string values to integers, floats, and booleans
    /// where they look like one.
    ///
    /// ## Example
    ///
    /// ```no_run
    /// use secure_json::Config;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Database {
    ///     host: String,
    ///     port: u16,
    /// }
    ///
    /// let settings = Config::builder()
    ///     .with_file("config/appsettings.json", true)
    ///     .build()?;
    ///
    /// let database: Database = settings.bind_at("Database")?;
    /// # Ok::<(), secure_json::ConfigError>(())
    /// ```
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        bind::bind(&self.entries)
    }

    /// Like [`bind`](Self::bind), scoped to the subtree under `prefix`.
    pub fn bind_at<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, ConfigError> {
        bind::bind_at(&self.entries, prefix)
    }
}
