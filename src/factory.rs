//! Construction of new segments.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::allocator::StorageLocationAllocator;
use crate::error::{RegistryError, Result};
use crate::model::{IndexDefinition, Segment, SegmentStatus};

/// Builds NEW segments with a fresh identity and a reserved storage location.
///
/// The factory never touches the definition: appending the segment and
/// persisting are up to the caller.
#[derive(Debug, Clone)]
pub struct SegmentFactory {
    allocator: Arc<StorageLocationAllocator>,
}

impl SegmentFactory {
    pub fn new(allocator: Arc<StorageLocationAllocator>) -> Self {
        Self { allocator }
    }

    /// Create a segment covering `[start_date, end_date)` in milliseconds.
    /// Pass `0, 0` for a full build.
    pub fn create(
        &self,
        definition: &IndexDefinition,
        start_date: i64,
        end_date: i64,
    ) -> Result<Segment> {
        if start_date > end_date {
            return Err(RegistryError::invalid_argument(format!(
                "invalid date range [{start_date}, {end_date}) for {}",
                definition.name
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        Ok(Segment {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: Segment::segment_name(start_date, end_date),
            status: SegmentStatus::New,
            date_range_start: start_date,
            date_range_end: end_date,
            storage_location_identifier: self.allocator.allocate()?,
            dictionaries: BTreeMap::new(),
            create_time_utc: now,
            size_kb: 0,
            source_records: 0,
            last_build_time: 0,
            last_build_job_id: None,
        })
    }
}
