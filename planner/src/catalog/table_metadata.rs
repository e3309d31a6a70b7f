use serde::{Deserialize, Serialize};

use common::schema::ColumnType;

/// Lifecycle status of a catalog document. Dropped entries are
/// retained (soft delete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataStatus {
    Active,
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnMeta {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            default_value: None,
        }
    }
}

/// Persistent description of one table. Look-up by name + Active
/// status is the hot path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub table_name: String,
    pub columns: Vec<ColumnMeta>,
    pub created_at: i64,
    pub updated_at: i64,
    pub status: MetadataStatus,
    pub estimated_row_count: u64,
}

impl TableMetadata {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnMeta>, now: i64) -> Self {
        TableMetadata {
            table_name: table_name.into(),
            columns,
            created_at: now,
            updated_at: now,
            status: MetadataStatus::Active,
            estimated_row_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MetadataStatus::Active
    }
}
