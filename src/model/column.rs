use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Reference to a column of a source table, written `TABLE.COLUMN`.
///
/// Both parts are upper-cased on construction so that references compare
/// equal regardless of how callers spelled them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl AsRef<str>, column: impl AsRef<str>) -> Self {
        Self {
            table: table.as_ref().to_uppercase(),
            column: column.as_ref().to_uppercase(),
        }
    }

    /// Key under which this column's dictionary path is recorded on a segment.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

impl FromStr for ColumnRef {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                Ok(ColumnRef::new(table, column))
            }
            _ => Err(RegistryError::invalid_argument(format!(
                "column reference must look like TABLE.COLUMN, got '{s}'"
            ))),
        }
    }
}
