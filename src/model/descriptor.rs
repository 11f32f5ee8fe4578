use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::model::RESOURCE_SUFFIX;
use crate::model::column::ColumnRef;

pub const DESCRIPTOR_RESOURCE_ROOT: &str = "/invertedindex_desc";

/// Schema an index definition realizes: which columns it covers and which of
/// them are metrics (metrics are stored raw and never dictionary-encoded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    /// Data model the dictionaries are built against.
    pub model_name: String,
    /// Every column in storage order, metrics included.
    pub columns: Vec<ColumnRef>,
    #[serde(default)]
    pub metrics: Vec<ColumnRef>,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_name: model_name.into(),
            columns: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnRef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_metric(mut self, column: ColumnRef) -> Self {
        if !self.columns.contains(&column) {
            self.columns.push(column.clone());
        }
        self.metrics.push(column);
        self
    }

    pub fn resource_path(&self) -> String {
        Self::concat_resource_path(&self.name)
    }

    pub fn concat_resource_path(name: &str) -> String {
        format!(
            "{DESCRIPTOR_RESOURCE_ROOT}/{}{RESOURCE_SUFFIX}",
            name.to_uppercase()
        )
    }

    pub fn list_all_columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn is_metric_column(&self, column: &ColumnRef) -> bool {
        self.metrics.contains(column)
    }

    /// Columns that need a dictionary before a segment can be queried.
    pub fn dimension_columns(&self) -> impl Iterator<Item = &ColumnRef> {
        self.columns.iter().filter(|c| !self.is_metric_column(c))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::invalid_argument(
                "index descriptor name must not be blank",
            ));
        }
        if let Some(metric) = self.metrics.iter().find(|m| !self.columns.contains(m)) {
            return Err(RegistryError::invalid_argument(format!(
                "metric column {metric} is not a column of descriptor {}",
                self.name
            )));
        }
        Ok(())
    }
}
