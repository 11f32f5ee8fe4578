//! Time-partitioned segments of an index definition.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::model::column::ColumnRef;
use crate::model::descriptor::IndexDescriptor;

/// Name given to a segment whose date range is `[0, 0)`.
pub const FULL_BUILD_SEGMENT_NAME: &str = "FULL_BUILD";

const SEGMENT_NAME_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Lifecycle state of a segment. `New` is the only state a segment may be
/// created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentStatus {
    New,
    Ready,
    ReadyPending,
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentStatus::New => "NEW",
            SegmentStatus::Ready => "READY",
            SegmentStatus::ReadyPending => "READY_PENDING",
        };
        f.write_str(s)
    }
}

/// One physical materialization of an index definition over a half-open
/// date range, stored in a single external storage object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub uuid: String,
    pub name: String,
    pub status: SegmentStatus,
    /// Inclusive start, milliseconds since epoch. Zero together with a zero
    /// end marks a full build.
    pub date_range_start: i64,
    /// Exclusive end, milliseconds since epoch.
    pub date_range_end: i64,
    pub storage_location_identifier: String,
    /// Column key (`TABLE.COLUMN`) to dictionary resource path. A missing
    /// key means the dictionary has not been built yet.
    #[serde(default)]
    pub dictionaries: BTreeMap<String, String>,
    pub create_time_utc: i64,
    #[serde(default)]
    pub size_kb: u64,
    #[serde(default)]
    pub source_records: u64,
    #[serde(default)]
    pub last_build_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build_job_id: Option<String>,
}

impl Segment {
    /// Deterministic segment name for a date range.
    pub fn segment_name(start: i64, end: i64) -> String {
        if start == 0 && end == 0 {
            return FULL_BUILD_SEGMENT_NAME.to_string();
        }
        format!("{}_{}", format_millis(start), format_millis(end))
    }

    pub fn is_full_build(&self) -> bool {
        self.date_range_start == 0 && self.date_range_end == 0
    }

    pub fn dictionary_path(&self, column: &ColumnRef) -> Option<&str> {
        self.dictionaries.get(&column.key()).map(String::as_str)
    }

    pub fn put_dictionary_path(&mut self, column: &ColumnRef, path: impl Into<String>) {
        self.dictionaries.insert(column.key(), path.into());
    }

    /// Dimension columns of `descriptor` that still lack a dictionary.
    pub fn missing_dictionaries<'a>(&self, descriptor: &'a IndexDescriptor) -> Vec<&'a ColumnRef> {
        descriptor
            .dimension_columns()
            .filter(|c| !self.dictionaries.contains_key(&c.key()))
            .collect()
    }

    pub fn is_dictionary_complete(&self, descriptor: &IndexDescriptor) -> bool {
        self.missing_dictionaries(descriptor).is_empty()
    }

    pub fn mark_ready(&mut self) -> Result<()> {
        match self.status {
            SegmentStatus::New | SegmentStatus::ReadyPending => {
                self.status = SegmentStatus::Ready;
                Ok(())
            }
            SegmentStatus::Ready => Err(RegistryError::invalid_argument(format!(
                "segment {} is already READY",
                self.name
            ))),
        }
    }
}

fn format_millis(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.format(SEGMENT_NAME_DATE_FORMAT).to_string(),
        None => millis.to_string(),
    }
}
