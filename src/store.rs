//! Path-addressed resource store the registry persists its records in.
//!
//! Paths are absolute, slash-separated strings such as
//! `/invertedindex/SALES_II.json`. The store deals in raw bytes; the JSON
//! helpers at the bottom of this module handle encoding.

pub mod file;
pub mod memory;

use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RegistryError, Result};

pub use file::FileResourceStore;
pub use memory::MemoryResourceStore;

/// Backing store shared by every process that uses the same configuration.
pub trait ResourceStore: Send + Sync + Debug {
    /// Recursively list every path under `root` that ends with `suffix`,
    /// sorted.
    fn list(&self, root: &str, suffix: &str) -> Result<Vec<String>>;

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite the record at `path`.
    fn put(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Create the record at `path` only if nothing is there yet. Returns
    /// `false` when the path was already taken.
    fn put_if_absent(&self, path: &str, data: &[u8]) -> Result<bool>;

    /// Returns `false` if there was nothing to delete.
    fn delete(&self, path: &str) -> Result<bool>;

    /// Human readable location of `path`, for log messages.
    fn readable_path(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Rejects paths that are relative or that try to climb out of the root.
pub(crate) fn check_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(RegistryError::invalid_argument(format!(
            "resource path must be absolute: '{path}'"
        )));
    }
    if path.split('/').any(|part| part == "..") {
        return Err(RegistryError::invalid_argument(format!(
            "resource path must not contain '..': '{path}'"
        )));
    }
    Ok(())
}

/// Read and decode a JSON record. Decode failures carry the path.
pub fn read_json<T: DeserializeOwned>(store: &dyn ResourceStore, path: &str) -> Result<Option<T>> {
    match store.get(path)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RegistryError::decode(path, e.to_string())),
        None => Ok(None),
    }
}

/// Encode and write a JSON record. Store failures surface as
/// [`RegistryError::Persist`].
pub fn write_json<T: Serialize>(store: &dyn ResourceStore, path: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store
        .put(path, &bytes)
        .map_err(|e| match e {
            RegistryError::Persist { .. } => e,
            other => RegistryError::persist(path, other.to_string()),
        })
}
