//! Persisted metadata records: index definitions, their segments, and the
//! descriptors they realize.

pub mod column;
pub mod definition;
pub mod descriptor;
pub mod segment;

pub use column::ColumnRef;
pub use definition::{INDEX_RESOURCE_ROOT, IndexDefinition, IndexStatus};
pub use descriptor::{DESCRIPTOR_RESOURCE_ROOT, IndexDescriptor};
pub use segment::{FULL_BUILD_SEGMENT_NAME, Segment, SegmentStatus};

/// Suffix shared by every persisted record path.
pub const RESOURCE_SUFFIX: &str = ".json";
