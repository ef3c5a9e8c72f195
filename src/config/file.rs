//! Secure JSON file loading and conditional write-back.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::flatten::{flatten, FlatMap};
use super::ConfigError;
use crate::vault::SecretCipher;

/// One registered configuration file.
///
/// Required files that don't exist cause an error; optional files that
/// don't exist are silently skipped.
#[derive(Debug, Clone)]
pub(crate) struct FileSource {
    pub(crate) path: PathBuf,
    pub(crate) required: bool,
}

/// Loads one secure JSON file: read, parse, flatten, and — only when a
/// plaintext secret was encrypted during the pass — write the mutated
/// document back over the original file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
pub(crate) fn load_secure_file(
    path: &Path,
    required: bool,
    cipher: Option<&dyn SecretCipher>,
) -> Result<Option<FlatMap>, ConfigError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            };
        }
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut document: Value =
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;

    let flattened = flatten(&mut document, cipher)?;

    if flattened.modified {
        write_back(path, &document)?;
    }

    Ok(Some(flattened.entries))
}

/// Re-serializes the document and atomically replaces the file (temp file
/// in the same directory, then rename), so an interrupted write never
/// leaves a half-written config behind.
fn write_back(path: &Path, document: &Value) -> Result<(), ConfigError> {
    let io_err = |source: std::io::Error| ConfigError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut tmp, document).map_err(|e| {
        io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Walks from `start` up through its ancestors looking for a file named
/// `file_name`; the first hit wins.
///
/// This is how a deployment-local override file is discovered: drop one
/// next to (or above) the working directory and register it as an extra
/// source. Absence is not an error.
pub fn find_override_config(start: impl AsRef<Path>, file_name: &str) -> Option<PathBuf> {
    let start = start.as_ref().canonicalize().ok()?;
    let mut current = Some(start.as_path());
    while let Some(dir) = current {
        let candidate = dir.join(file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}
