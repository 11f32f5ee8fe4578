//! # ii-registry
//!
//! Metadata registry for inverted index definitions and their time-partitioned
//! segments.
//!
//! ## Features
//!
//! - Cache of every persisted index definition, loaded at startup
//! - Whole-definition commits with cross-process cache invalidation
//! - Collision-free storage location allocation for new segments
//! - Per-segment tracking of column dictionary resources
//! - One registry per configuration through [`RegistryManager`]

pub mod allocator;
mod cache;
pub mod catalog;
pub mod config;
pub mod dictionary;
pub mod error;
mod factory;
pub mod invalidation;
mod manager;
pub mod model;
mod registry;
pub mod store;

// Re-exports for the public API
pub use allocator::{LocationGenerator, RandomLocationGenerator, StorageLocationAllocator};
pub use catalog::{DescriptorCatalog, StoreDescriptorCatalog};
pub use config::{RegistryConfig, ReservationMode};
pub use dictionary::{DictionaryGateway, DictionaryInfo};
pub use error::{RegistryError, Result};
pub use factory::SegmentFactory;
pub use invalidation::{
    InvalidationChannel, InvalidationEvent, InvalidationListener, LocalBroadcaster, NoopChannel,
};
pub use manager::{ContextFactory, RegistryManager};
pub use model::{ColumnRef, IndexDefinition, IndexDescriptor, Segment, SegmentStatus};
pub use registry::{LoadFailure, LoadReport, Registry, RegistryContext};
pub use store::{FileResourceStore, MemoryResourceStore, ResourceStore};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
