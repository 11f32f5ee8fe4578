//! One registry per configuration.
//!
//! [`RegistryManager`] maps a [`RegistryConfig`] to the single [`Registry`]
//! built for it. The first caller for a config pays for construction (which
//! loads every definition); concurrent callers for the same config wait and
//! then share the result.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::registry::{Registry, RegistryContext};

/// Produces the collaborators for a new registry.
pub type ContextFactory = dyn Fn(&RegistryConfig) -> Result<RegistryContext> + Send + Sync;

pub struct RegistryManager {
    instances: RwLock<HashMap<RegistryConfig, Arc<Registry>>>,
    create_lock: Mutex<()>,
    factory: Box<ContextFactory>,
}

impl RegistryManager {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&RegistryConfig) -> Result<RegistryContext> + Send + Sync + 'static,
    {
        Self {
            instances: RwLock::new(HashMap::new()),
            create_lock: Mutex::new(()),
            factory: Box::new(factory),
        }
    }

    /// Registry for `config`, creating it on first use.
    pub fn instance(&self, config: &RegistryConfig) -> Result<Arc<Registry>> {
        if let Some(registry) = self.instances.read().get(config) {
            return Ok(registry.clone());
        }

        let _guard = self.create_lock.lock();
        if let Some(registry) = self.instances.read().get(config) {
            return Ok(registry.clone());
        }

        let context = (self.factory)(config)?;
        let (registry, report) = Registry::open(config.clone(), context)?;
        if !report.is_clean() {
            log::warn!(
                "Registry for {} started with {} unreadable definition(s)",
                config.metadata_url,
                report.failures.len()
            );
        }

        let registry = Arc::new(registry);
        let mut instances = self.instances.write();
        instances.insert(config.clone(), registry.clone());
        if instances.len() > 1 {
            log::warn!("More than one registry instance exists");
        }
        Ok(registry)
    }

    /// Forget the registry for `config`. Holders of the `Arc` keep a working
    /// instance; the next [`instance`](Self::instance) call builds a new one.
    pub fn remove(&self, config: &RegistryConfig) -> Option<Arc<Registry>> {
        let _guard = self.create_lock.lock();
        self.instances.write().remove(config)
    }

    pub fn clear(&self) {
        let _guard = self.create_lock.lock();
        self.instances.write().clear();
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}
