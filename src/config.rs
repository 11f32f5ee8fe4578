//! Registry configuration.
//!
//! A [`RegistryConfig`] identifies one metadata deployment. Two registries
//! built from equal configs are the same logical registry, which is why the
//! config derives `Hash` and `Eq`: [`RegistryManager`](crate::RegistryManager)
//! keys its instances on it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: usize = 1024;

/// How storage location identifiers are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationMode {
    /// Uniqueness is checked only against identifiers this process has seen.
    /// Two processes allocating before either invalidation propagates may
    /// pick the same identifier.
    #[default]
    Local,
    /// Every identifier is additionally claimed with an insert-if-absent
    /// reservation record in the resource store. Reservations are never
    /// released, so evicted identifiers are not reused.
    Store,
}

/// Configuration for a single registry instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Identity of the metadata deployment. Also written as the owner tag on
    /// external storage objects.
    pub metadata_url: String,

    /// Upper bound on identifier generation retries before giving up.
    #[serde(default = "default_max_allocation_attempts")]
    pub max_allocation_attempts: usize,

    #[serde(default)]
    pub reservation: ReservationMode,
}

fn default_max_allocation_attempts() -> usize {
    DEFAULT_MAX_ALLOCATION_ATTEMPTS
}

impl RegistryConfig {
    pub fn new(metadata_url: impl Into<String>) -> Self {
        Self {
            metadata_url: metadata_url.into(),
            max_allocation_attempts: DEFAULT_MAX_ALLOCATION_ATTEMPTS,
            reservation: ReservationMode::Local,
        }
    }

    pub fn builder(metadata_url: impl Into<String>) -> RegistryConfigBuilder {
        RegistryConfigBuilder {
            config: Self::new(metadata_url),
        }
    }

    /// Read a config from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let config: RegistryConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metadata_url.trim().is_empty() {
            return Err(RegistryError::invalid_config(
                "metadata_url must not be blank",
            ));
        }
        if self.max_allocation_attempts == 0 {
            return Err(RegistryError::invalid_config(
                "max_allocation_attempts must be greater than zero",
            ));
        }
        Ok(())
    }
}

pub struct RegistryConfigBuilder {
    config: RegistryConfig,
}

impl RegistryConfigBuilder {
    pub fn max_allocation_attempts(mut self, attempts: usize) -> Self {
        self.config.max_allocation_attempts = attempts;
        self
    }

    pub fn reservation(mut self, mode: ReservationMode) -> Self {
        self.config.reservation = mode;
        self
    }

    pub fn build(self) -> Result<RegistryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
