//! Depth-first flattening of a JSON document into delimited keys.

use std::collections::BTreeMap;

use serde_json::Value;

use super::secret::{self, KEY_DELIMITER};
use super::ConfigError;
use crate::vault::SecretCipher;

/// Flat key-value view of one configuration document.
///
/// Keys are compared case-insensitively and iterated in a deterministic
/// order. A `None` value is the absence marker recorded for empty objects
/// and arrays.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlatMap {
    entries: BTreeMap<String, Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: Option<String>,
}

impl FlatMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_lowercase())
            .and_then(|entry| entry.value.as_deref())
    }

    /// Inserts or overwrites an entry. Duplicate detection is the walker's
    /// responsibility; empty-container markers and cross-file overrides
    /// write unchecked.
    pub(crate) fn set(&mut self, key: &str, value: Option<String>) {
        self.entries.insert(
            key.to_lowercase(),
            Entry {
                key: key.to_string(),
                value,
            },
        );
    }

    /// Overlays `other` on top of this map, later entries winning per key.
    pub(crate) fn merge(&mut self, other: FlatMap) {
        for entry in other.entries.into_values() {
            self.set(&entry.key, entry.value);
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .values()
            .map(|entry| (entry.key.as_str(), entry.value.as_deref()))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of flattening one document: the entries plus whether any leaf
/// was re-encrypted (and the document therefore needs writing back).
#[derive(Debug)]
pub(crate) struct Flattened {
    pub(crate) entries: FlatMap,
    pub(crate) modified: bool,
}

/// Flattens `root`, encrypting or decrypting secret leaves through `cipher`.
///
/// Encryption rewrites the affected leaves of `root` in place; the caller
/// decides what to do with the mutated document based on `modified`.
pub(crate) fn flatten(
    root: &mut Value,
    cipher: Option<&dyn SecretCipher>,
) -> Result<Flattened, ConfigError> {
    let mut walker = Walker {
        entries: FlatMap::new(),
        modified: false,
        cipher,
    };
    walker.visit(root, "")?;
    Ok(Flattened {
        entries: walker.entries,
        modified: walker.modified,
    })
}

struct Walker<'a> {
    entries: FlatMap,
    modified: bool,
    cipher: Option<&'a dyn SecretCipher>,
}

impl Walker<'_> {
    /// Recursive descent carrying the joined path by value per frame, so an
    /// error partway through a container cannot leave a stale segment
    /// behind.
    fn visit(&mut self, value: &mut Value, path: &str) -> Result<(), ConfigError> {
        match value {
            Value::Object(properties) => {
                if properties.is_empty() {
                    self.mark_empty(path);
                    return Ok(());
                }
                for (name, child) in properties.iter_mut() {
                    let child_path = join(path, name);
                    self.visit(child, &child_path)?;
                }
                Ok(())
            }
            Value::Array(items) => {
                if items.is_empty() {
                    self.mark_empty(path);
                    return Ok(());
                }
                for (index, child) in items.iter_mut().enumerate() {
                    let child_path = join(path, &index.to_string());
                    self.visit(child, &child_path)?;
                }
                Ok(())
            }
            leaf => self.visit_leaf(leaf, path),
        }
    }

    fn visit_leaf(&mut self, leaf: &mut Value, path: &str) -> Result<(), ConfigError> {
        let stored_key = secret::strip_markers(path);
        if self.entries.contains_key(&stored_key) {
            return Err(ConfigError::DuplicateKey(stored_key));
        }
        let stored_value = secret::handle_leaf(path, leaf, self.cipher, &mut self.modified)?;
        self.entries.set(&stored_key, Some(stored_value));
        Ok(())
    }

    /// An empty container records its own path with the absence marker.
    /// The document root has no path to record.
    fn mark_empty(&mut self, path: &str) {
        if !path.is_empty() {
            self.entries.set(path, None);
        }
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}{KEY_DELIMITER}{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::KeyVault;
    use serde_json::json;

    fn flatten_plain(mut document: Value) -> FlatMap {
        flatten(&mut document, None).unwrap().entries
    }

    #[test]
    fn flattens_nested_objects() {
        let entries = flatten_plain(json!({
            "Database": { "Host": "localhost", "Port": 5432 },
            "Name": "demo"
        }));

        assert_eq!(entries.get("Database:Host"), Some("localhost"));
        assert_eq!(entries.get("Database:Port"), Some("5432"));
        assert_eq!(entries.get("Name"), Some("demo"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn flattens_arrays_by_index() {
        let entries = flatten_plain(json!({ "List": ["a", "b"] }));

        assert_eq!(entries.get("List:0"), Some("a"));
        assert_eq!(entries.get("List:1"), Some("b"));
    }

    #[test]
    fn empty_containers_record_absence_markers() {
        let entries = flatten_plain(json!({ "Empty": {}, "Hollow": [] }));

        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("Empty"));
        assert!(entries.contains_key("Hollow"));
        assert_eq!(entries.get("Empty"), None);
        assert_eq!(entries.get("Hollow"), None);
    }

    #[test]
    fn empty_root_produces_no_entries() {
        assert!(flatten_plain(json!({})).is_empty());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let entries = flatten_plain(json!({ "Database": { "Host": "db" } }));
        assert_eq!(entries.get("database:host"), Some("db"));
        assert_eq!(entries.get("DATABASE:HOST"), Some("db"));
    }

    #[test]
    fn scalars_render_in_textual_form() {
        let entries = flatten_plain(json!({
            "Flag": true,
            "Ratio": 2.5,
            "Missing": null
        }));

        assert_eq!(entries.get("Flag"), Some("true"));
        assert_eq!(entries.get("Ratio"), Some("2.5"));
        assert_eq!(entries.get("Missing"), Some(""));
    }

    #[test]
    fn duplicate_keys_differing_in_case_are_fatal() {
        let mut document = json!({ "Outer": { "Key": 1 }, "outer": { "key": 2 } });
        let err = flatten(&mut document, None).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey(_)));
    }

    #[test]
    fn marker_stripped_collision_is_fatal() {
        // "$Secret" and "Secret" both store under "Secret".
        let cipher = KeyVault::from_key_bytes(&[42u8; 32]).unwrap();
        let mut document = json!({ "Secret": "a", "$Secret": "b" });
        let err = flatten(&mut document, Some(&cipher)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey(key) if key == "Secret"));
    }

    #[test]
    fn secret_under_marked_ancestor_is_protected() {
        let cipher = KeyVault::from_key_bytes(&[42u8; 32]).unwrap();
        let mut document = json!({ "$Database": { "Password": "hunter2", "Retries": 3 } });

        let flattened = flatten(&mut document, Some(&cipher)).unwrap();

        assert!(flattened.modified);
        assert_eq!(flattened.entries.get("Database:Password"), Some("hunter2"));
        assert_eq!(flattened.entries.get("Database:Retries"), Some("3"));
        let sealed = document["$Database"]["Password"].as_str().unwrap();
        assert!(sealed.starts_with("$ENCRYPTED:"));
    }

    #[test]
    fn documents_without_secrets_need_no_cipher_and_no_write_back() {
        let mut document = json!({ "Plain": "value", "Nested": { "Number": 7 } });
        let flattened = flatten(&mut document, None).unwrap();

        assert!(!flattened.modified);
        assert_eq!(flattened.entries.get("Nested:Number"), Some("7"));
    }

    #[test]
    fn merge_overlays_later_entries_per_key() {
        let mut base = flatten_plain(json!({ "A": 1, "B": 2 }));
        let overlay = flatten_plain(json!({ "b": 20, "C": 30 }));

        base.merge(overlay);

        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(base.get("B"), Some("20"));
        assert_eq!(base.get("C"), Some("30"));
        assert_eq!(base.len(), 3);
    }
}
