use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use common::err::DbError;
use common::schema::{Row, Table};

/// Wire response envelope. `data` carries JSON-in-string for SELECT
/// and EXPLAIN results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

impl SqlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        SqlResponse {
            success: true,
            message: Some(message.into()),
            data: None,
            error_code: None,
        }
    }

    pub fn ok_with_data(message: impl Into<String>, data: impl Into<String>) -> Self {
        SqlResponse {
            success: true,
            message: Some(message.into()),
            data: Some(data.into()),
            error_code: None,
        }
    }

    pub fn error(message: impl Into<String>, error_code: Option<u16>) -> Self {
        SqlResponse {
            success: false,
            message: Some(message.into()),
            data: None,
            error_code,
        }
    }

    pub fn from_error(e: &DbError) -> Self {
        SqlResponse::error(e.to_string(), e.error_code())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            "{\"success\":false,\"message\":\"response serialization failed\",\"errorCode\":500}"
                .to_string()
        })
    }
}

/// SELECT `data` payload: the whole table as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    pub table_name: String,
    pub data_type: BTreeMap<String, String>,
    pub rows: Vec<Row>,
}

impl TablePayload {
    pub fn from_table(table: &Table) -> Self {
        TablePayload {
            table_name: table.name.clone(),
            data_type: table
                .schema
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.column_type.as_sql().to_string()))
                .collect(),
            rows: table.rows.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use common::schema::{Column, ColumnType};

    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let json = SqlResponse::ok("pong").to_json();
        assert_eq!(json, "{\"success\":true,\"message\":\"pong\"}");

        let json = SqlResponse::error("bad", Some(400)).to_json();
        assert!(json.contains("\"errorCode\":400"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn table_payload_shape() {
        let mut table = Table::new(
            "users",
            vec![
                Column::new("id", ColumnType::Int),
                Column::new("name", ColumnType::Varchar),
            ],
        );
        let mut r = Row::new();
        r.insert("id".into(), "1".into());
        r.insert("name".into(), "John".into());
        table.rows.push(r);

        let json = serde_json::to_string(&TablePayload::from_table(&table)).unwrap();
        let parsed: TablePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.table_name, "users");
        assert_eq!(parsed.data_type["id"], "INT");
        assert_eq!(parsed.data_type["name"], "VARCHAR");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0]["name"], "John");
    }
}
