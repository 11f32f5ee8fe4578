//! In-memory view of the persisted index definitions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::invalidation::{CacheCategory, InvalidationChannel, InvalidationEvent, InvalidationKind};
use crate::model::IndexDefinition;

#[derive(Debug, Clone)]
struct CacheEntry {
    definition: Arc<IndexDefinition>,
    /// Store path the definition was read from or last written to.
    path: String,
}

/// Definitions keyed by upper-cased name, each remembering its record path.
///
/// `put_local` is for entries read from the store (startup, reloads after a
/// peer's event); `put` is for entries this process just persisted and also
/// tells peers to reload.
#[derive(Debug)]
pub struct DefinitionCache {
    category: CacheCategory,
    origin: String,
    entries: RwLock<HashMap<String, CacheEntry>>,
    channel: Arc<dyn InvalidationChannel>,
}

impl DefinitionCache {
    pub fn new(
        category: CacheCategory,
        origin: impl Into<String>,
        channel: Arc<dyn InvalidationChannel>,
    ) -> Self {
        Self {
            category,
            origin: origin.into(),
            entries: RwLock::new(HashMap::new()),
            channel,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<IndexDefinition>> {
        self.entries
            .read()
            .get(&name.to_uppercase())
            .map(|e| e.definition.clone())
    }

    pub fn path_of(&self, name: &str) -> Option<String> {
        self.entries
            .read()
            .get(&name.to_uppercase())
            .map(|e| e.path.clone())
    }

    pub fn values(&self) -> Vec<Arc<IndexDefinition>> {
        self.entries
            .read()
            .values()
            .map(|e| e.definition.clone())
            .collect()
    }

    /// Cache a definition read from `path`.
    ///
    /// Fails with the owning path when a different record already holds the
    /// same upper-cased name; the cached entry is left alone in that case.
    pub fn put_local(
        &self,
        definition: Arc<IndexDefinition>,
        path: &str,
    ) -> std::result::Result<Option<Arc<IndexDefinition>>, String> {
        let mut guard = self.entries.write();
        let key = definition.key();
        if let Some(existing) = guard.get(&key)
            && existing.path != path
        {
            return Err(existing.path.clone());
        }
        let previous = guard.insert(
            key,
            CacheEntry {
                definition,
                path: path.to_string(),
            },
        );
        Ok(previous.map(|e| e.definition))
    }

    /// Cache a definition just persisted at `path` and announce it.
    pub fn put(&self, definition: Arc<IndexDefinition>, path: &str) -> Option<Arc<IndexDefinition>> {
        let name = definition.name.clone();
        let previous = self.entries.write().insert(
            definition.key(),
            CacheEntry {
                definition,
                path: path.to_string(),
            },
        );
        self.channel.publish(InvalidationEvent {
            category: self.category,
            kind: InvalidationKind::Update,
            name,
            origin: self.origin.clone(),
        });
        previous.map(|e| e.definition)
    }

    pub fn remove_local(&self, name: &str) -> Option<Arc<IndexDefinition>> {
        self.entries
            .write()
            .remove(&name.to_uppercase())
            .map(|e| e.definition)
    }
}
