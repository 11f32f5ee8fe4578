//! Dictionary gateway consumed by the registry.
//!
//! Building a dictionary (reading fact data, encoding distinct values) is the
//! gateway's business. The registry only records where the result lives.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::ColumnRef;

/// Descriptor of a built dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryInfo {
    /// Resource path of the encoded dictionary. This is what segments record.
    pub resource_path: String,
    pub model_name: String,
    pub column: ColumnRef,
    #[serde(default)]
    pub cardinality: u64,
}

pub trait DictionaryGateway: Send + Sync + Debug {
    /// Build, or look up an equivalent existing, dictionary for `column` from
    /// the raw fact data at `source_data_path`.
    ///
    /// May be called again for the same inputs after a later failure, so
    /// implementations should be idempotent.
    fn build(
        &self,
        model_name: &str,
        column: &ColumnRef,
        source_data_path: &str,
    ) -> Result<DictionaryInfo>;

    /// Look up a dictionary by resource path. `None` if it does not exist.
    fn info(&self, resource_path: &str) -> Result<Option<DictionaryInfo>>;
}
