use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::err::{DbError, DbResult};

/// Column types of the dialect. The discriminant is the on-disk tag
/// byte written into the schema section of every table file.
#[derive(
    Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Int = 0x01,
    Varchar = 0x02,
    Timestamp = 0x03,
    Boolean = 0x04,
}

impl ColumnType {
    /// Parses a declared type name, case-insensitively.
    pub fn from_decl(decl: &str) -> DbResult<Self> {
        match decl.trim().to_ascii_uppercase().as_str() {
            "INT" => Ok(ColumnType::Int),
            "VARCHAR" => Ok(ColumnType::Varchar),
            "TIMESTAMP" => Ok(ColumnType::Timestamp),
            "BOOLEAN" => Ok(ColumnType::Boolean),
            other => Err(DbError::UnsupportedType(other.to_string())),
        }
    }

    /// Canonical SQL spelling.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Int => "INT",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    pub fn tag(&self) -> u8 {
        (*self).into()
    }

    pub fn from_tag(tag: u8) -> DbResult<Self> {
        ColumnType::try_from(tag)
            .map_err(|_| DbError::UnsupportedType(format!("type tag 0x{:02x}", tag)))
    }
}
