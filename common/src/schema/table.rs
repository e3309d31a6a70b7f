use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::column_type::ColumnType;

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column declarations. Declaration order is significant: it
/// is the on-disk field order of every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TableSchema {
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        TableSchema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// String-form row. Keys are a subset of the schema columns.
pub type Row = HashMap<String, String>;

/// One table; rows are append-only, the schema never mutates after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Table {
            name: name.into(),
            schema: TableSchema::new(columns),
            rows: Vec::new(),
        }
    }

    /// Canonical `CREATE TABLE name (col TYPE, ...)` echo form.
    pub fn ddl_string(&self) -> String {
        let cols = self
            .schema
            .columns()
            .iter()
            .map(|c| format!("{} {}", c.name, c.column_type.as_sql()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", self.name, cols)
    }
}
