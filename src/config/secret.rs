//! Secret handling for flattened configuration leaves.
//!
//! A path segment prefixed with `$` marks the leaves under it as secrets.
//! Secret leaves are kept encrypted on disk in the envelope form
//! `"$ENCRYPTED:" + base64(ciphertext)` and transparently decrypted into the
//! in-memory map; plaintext secrets found on disk are encrypted in place so
//! the file can be rewritten.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;

use super::ConfigError;
use crate::vault::SecretCipher;

pub(crate) const KEY_DELIMITER: &str = ":";

const SECRET_MARKER: char = '$';
const ENVELOPE_PREFIX: &str = "$ENCRYPTED:";

/// A key is in secret scope if any of its segments carries the marker.
///
/// The check is a substring scan over the joined path, not a structural
/// walk: a marker on an ancestor segment covers every leaf below it.
pub(crate) fn is_secret_key(key: &str) -> bool {
    key.starts_with(SECRET_MARKER) || key.contains(":$")
}

/// Removes the marker from every segment it prefixes.
///
/// The stored, consumer-visible key is always marker-free; the property
/// name in the JSON document keeps its marker.
pub(crate) fn strip_markers(key: &str) -> String {
    let key = key.strip_prefix(SECRET_MARKER).unwrap_or(key);
    key.replace(":$", KEY_DELIMITER)
}

/// Renders a scalar leaf in its textual form. Null renders as empty.
pub(crate) fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Resolves one scalar leaf to the value stored in the flat map.
///
/// Outside secret scope the printed form is returned untouched. Inside it,
/// an enveloped value is decrypted (the document is not mutated on this
/// path) and a plaintext value is encrypted in place, replacing the leaf
/// with its envelope and setting `modified`. Either way the plaintext is
/// what the caller stores.
pub(crate) fn handle_leaf(
    key: &str,
    value: &mut Value,
    cipher: Option<&dyn SecretCipher>,
    modified: &mut bool,
) -> Result<String, ConfigError> {
    let text = render_scalar(value);

    // Null leaves carry nothing to protect, even in secret scope.
    if !is_secret_key(key) || value.is_null() {
        return Ok(text);
    }

    let cipher = cipher.ok_or_else(|| ConfigError::MissingCipher(key.to_string()))?;

    if let Some(payload) = text.strip_prefix(ENVELOPE_PREFIX) {
        let blob = STANDARD
            .decode(payload)
            .map_err(|source| ConfigError::InvalidEnvelope {
                key: key.to_string(),
                source,
            })?;
        let plaintext = cipher
            .decrypt(&blob)
            .map_err(|source| ConfigError::DecryptError {
                key: key.to_string(),
                source,
            })?;
        String::from_utf8(plaintext).map_err(|_| ConfigError::NotUtf8(key.to_string()))
    } else {
        let sealed = cipher
            .encrypt(text.as_bytes())
            .map_err(|source| ConfigError::EncryptError {
                key: key.to_string(),
                source,
            })?;
        *value = Value::String(format!("{ENVELOPE_PREFIX}{}", STANDARD.encode(sealed)));
        *modified = true;
        Ok(text)
    }
}
