//! Where index descriptors come from.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::model::IndexDescriptor;
use crate::store::{self, ResourceStore};

pub trait DescriptorCatalog: Send + Sync + Debug {
    /// Case-insensitive lookup by descriptor name.
    fn descriptor(&self, name: &str) -> Result<Option<IndexDescriptor>>;
}

/// Reads descriptors from `/invertedindex_desc/<NAME>.json` in a resource
/// store. Nothing is cached; every lookup hits the store.
#[derive(Debug, Clone)]
pub struct StoreDescriptorCatalog {
    store: Arc<dyn ResourceStore>,
}

impl StoreDescriptorCatalog {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, descriptor: &IndexDescriptor) -> Result<()> {
        descriptor.validate()?;
        store::write_json(self.store.as_ref(), &descriptor.resource_path(), descriptor)
    }
}

impl DescriptorCatalog for StoreDescriptorCatalog {
    fn descriptor(&self, name: &str) -> Result<Option<IndexDescriptor>> {
        let path = IndexDescriptor::concat_resource_path(name);
        store::read_json(self.store.as_ref(), &path)
    }
}
