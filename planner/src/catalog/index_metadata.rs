use serde::{Deserialize, Serialize};

use crate::catalog::table_metadata::MetadataStatus;

/// Only B-tree semantics are planned against; the other kinds exist as
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    BTree,
    Hash,
    FullText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub index_name: String,
    pub table_name: String,
    /// Indexed columns in order; the first is the leading column, the
    /// only one usable for single-column equality planning.
    pub columns: Vec<String>,
    pub index_type: IndexType,
    pub unique: bool,
    pub status: MetadataStatus,
}

impl IndexMetadata {
    pub fn new(
        index_name: impl Into<String>,
        table_name: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        IndexMetadata {
            index_name: index_name.into(),
            table_name: table_name.into(),
            columns,
            index_type: IndexType::BTree,
            unique: false,
            status: MetadataStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MetadataStatus::Active
    }

    pub fn leading_column(&self) -> Option<&str> {
        self.columns.first().map(|c| c.as_str())
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// An index covers a select list when every selected column is one
    /// of its columns; the per-name comparison is case-insensitive.
    pub fn covers(&self, select_columns: &[String]) -> bool {
        select_columns.iter().all(|wanted| {
            self.columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(wanted))
        })
    }
}
