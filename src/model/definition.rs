//! Index definitions.

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::model::RESOURCE_SUFFIX;
use crate::model::segment::{Segment, SegmentStatus};

/// Store root under which every index definition record lives.
pub const INDEX_RESOURCE_ROOT: &str = "/invertedindex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexStatus {
    #[default]
    Disabled,
    Ready,
}

/// One logical inverted-index table and the segments that materialize it.
///
/// Segments are kept in creation order. A definition owns its segments
/// outright; code that needs the descriptor of a segment goes through the
/// definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub uuid: String,
    pub name: String,
    /// Name of the [`IndexDescriptor`](crate::model::IndexDescriptor) realized.
    pub descriptor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: IndexStatus,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub create_time_utc: i64,
    /// Stamped by the registry each time the record is persisted.
    #[serde(default)]
    pub last_modified: i64,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            descriptor: descriptor.into(),
            owner: None,
            status: IndexStatus::Disabled,
            segments: Vec::new(),
            create_time_utc: chrono::Utc::now().timestamp_millis(),
            last_modified: 0,
        }
    }

    /// Cache key: the upper-cased name.
    pub fn key(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn resource_path(&self) -> String {
        Self::concat_resource_path(&self.name)
    }

    /// Record path for `name`, spelled exactly as given.
    pub fn concat_resource_path(name: &str) -> String {
        format!("{INDEX_RESOURCE_ROOT}/{name}{RESOURCE_SUFFIX}")
    }

    pub fn segment(&self, uuid: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.uuid == uuid)
    }

    pub fn segment_mut(&mut self, uuid: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.uuid == uuid)
    }

    pub fn segments_with_status(&self, status: SegmentStatus) -> Vec<&Segment> {
        self.segments.iter().filter(|s| s.status == status).collect()
    }

    pub fn latest_ready_segment(&self) -> Option<&Segment> {
        self.segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Ready)
            .max_by_key(|s| s.date_range_end)
    }

    /// End of the data covered by READY segments, or zero if none is ready.
    pub fn date_range_end(&self) -> i64 {
        self.latest_ready_segment()
            .map(|s| s.date_range_end)
            .unwrap_or(0)
    }

    pub fn storage_locations(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .map(|s| s.storage_location_identifier.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::invalid_argument(
                "index definition name must not be blank",
            ));
        }
        if self.descriptor.trim().is_empty() {
            return Err(RegistryError::invalid_argument(format!(
                "index definition {} has no descriptor",
                self.name
            )));
        }
        Ok(())
    }
}
