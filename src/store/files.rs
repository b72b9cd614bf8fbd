//! JSON file access for the data directory.
//!
//! Reads distinguish optional sources (missing file → `None`) from required
//! ones. Writes go to a sibling temp file first and are renamed into place, so
//! a reader never sees a half-written file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("required file not found: {0}")]
    Missing(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load a JSON file, returning `None` when it does not exist.
pub fn load_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

/// Load a JSON file that must exist.
pub fn load_required<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    load_optional(path)?.ok_or_else(|| StoreError::Missing(path.to_path_buf()))
}

/// Load a source collection, degrading to empty when the file is missing or
/// unreadable.
pub fn load_source<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match load_optional::<Vec<T>>(path) {
        Ok(Some(records)) => records,
        Ok(None) => {
            tracing::warn!("Source file not found: {}", path.display());
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("Source unavailable, treating as empty: {}", e);
            Vec::new()
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json).map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(io_err)?;
    Ok(())
}
