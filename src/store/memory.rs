use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::store::{ResourceStore, check_path};

/// In-process store. Cloning an `Arc` of it is how several registries in one
/// process share a backing store.
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ResourceStore for MemoryResourceStore {
    fn list(&self, root: &str, suffix: &str) -> Result<Vec<String>> {
        check_path(root)?;
        let prefix = format!("{}/", root.trim_end_matches('/'));
        let guard = self.records.read();
        Ok(guard
            .range::<String, _>(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| path.ends_with(suffix))
            .map(|(path, _)| path.clone())
            .collect())
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        check_path(path)?;
        Ok(self.records.read().get(path).cloned())
    }

    fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        check_path(path)?;
        self.records.write().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn put_if_absent(&self, path: &str, data: &[u8]) -> Result<bool> {
        check_path(path)?;
        let mut guard = self.records.write();
        if guard.contains_key(path) {
            return Ok(false);
        }
        guard.insert(path.to_string(), data.to_vec());
        Ok(true)
    }

    fn delete(&self, path: &str) -> Result<bool> {
        check_path(path)?;
        Ok(self.records.write().remove(path).is_some())
    }

    fn readable_path(&self, path: &str) -> String {
        format!("memory:{path}")
    }
}
