//! Reassembly of flat entries into typed configuration structs.
//!
//! The flat map only holds strings, so values are coerced back to the most
//! specific JSON type (integer, float, boolean) before deserialization, and
//! objects whose keys form a contiguous `0..n` index sequence become arrays.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::flatten::FlatMap;
use super::secret::KEY_DELIMITER;
use super::ConfigError;

pub(crate) fn bind<T: DeserializeOwned>(entries: &FlatMap) -> Result<T, ConfigError> {
    let tree = assemble(entries.iter());
    serde_json::from_value(tree).map_err(ConfigError::BindError)
}

pub(crate) fn bind_at<T: DeserializeOwned>(
    entries: &FlatMap,
    prefix: &str,
) -> Result<T, ConfigError> {
    let scoped = entries
        .iter()
        .filter_map(|(key, value)| strip_prefix_ci(key, prefix).map(|rest| (rest, value)));
    serde_json::from_value(assemble(scoped)).map_err(ConfigError::BindError)
}

/// Strips `prefix` plus the delimiter from `key`, ignoring ASCII case.
fn strip_prefix_ci<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let n = prefix.len();
    let bytes = key.as_bytes();
    if bytes.len() > n + 1
        && bytes[..n].eq_ignore_ascii_case(prefix.as_bytes())
        && bytes[n] == b':'
    {
        Some(&key[n + 1..])
    } else {
        None
    }
}

fn assemble<'a>(entries: impl Iterator<Item = (&'a str, Option<&'a str>)>) -> Value {
    let mut root = Map::new();
    for (key, value) in entries {
        let leaf = match value {
            Some(text) => coerce_value(text),
            None => Value::Null,
        };
        let segments: Vec<&str> = key.split(KEY_DELIMITER).collect();
        insert_path(&mut root, &segments, leaf);
    }
    arrayify(Value::Object(root))
}

fn insert_path(map: &mut Map<String, Value>, segments: &[&str], leaf: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*first).to_string(), leaf);
        return;
    }
    let slot = map
        .entry((*first).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Some(nested) = slot.as_object_mut() {
        insert_path(nested, rest, leaf);
    }
}

/// Coerces a stored string to the most specific JSON type:
/// boolean, integer, float, or string (fallback).
fn coerce_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if looks_like_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::from(i);
        }
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return Value::from(f);
        }
    }

    Value::String(s.to_string())
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Converts objects whose keys are exactly the indices `0..n` into arrays,
/// bottom-up.
fn arrayify(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let rebuilt: Map<String, Value> = map.into_iter().map(|(k, v)| (k, arrayify(v))).collect();

    if rebuilt.is_empty() || !is_index_sequence(&rebuilt) {
        return Value::Object(rebuilt);
    }

    let len = rebuilt.len();
    let mut items = vec![Value::Null; len];
    for (key, item) in rebuilt {
        if let Ok(index) = key.parse::<usize>() {
            if index < len {
                items[index] = item;
            }
        }
    }
    Value::Array(items)
}

fn is_index_sequence(map: &Map<String, Value>) -> bool {
    let mut indices: Vec<usize> = Vec::with_capacity(map.len());
    for key in map.keys() {
        match key.parse::<usize>() {
            Ok(i) if i < map.len() && key == &i.to_string() => indices.push(i),
            _ => return false,
        }
    }
    indices.sort_unstable();
    indices.iter().enumerate().all(|(expected, &actual)| expected == actual)
}
