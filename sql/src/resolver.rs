use common::err::{DbError, DbResult};
use common::schema::{validator, Column};

use crate::parser::SelectQuery;

/// Read-only view of the catalog the resolver checks against.
pub trait SchemaView {
    fn table_exists(&self, table: &str) -> bool;

    /// Ordered columns of a live table, `None` when absent.
    fn columns(&self, table: &str) -> Option<Vec<Column>>;
}

/// Semantic checks for a SELECT: the table exists and every referenced
/// column is declared. Statistics and indexes are none of the
/// resolver's business.
pub fn resolve_select(query: &SelectQuery, view: &dyn SchemaView) -> DbResult<()> {
    let columns = view
        .columns(&query.table_name)
        .ok_or_else(|| DbError::TableNotFound(query.table_name.clone()))?;
    let known = |name: &str| columns.iter().any(|c| c.name == name);

    for column in &query.select_columns {
        if column != "*" && !known(column) {
            return Err(unknown_column(column, &query.table_name));
        }
    }
    for condition in &query.where_conditions {
        if !known(&condition.column) {
            return Err(unknown_column(&condition.column, &query.table_name));
        }
    }
    for column in &query.order_by {
        if !known(column) {
            return Err(unknown_column(column, &query.table_name));
        }
    }
    Ok(())
}

/// Semantic checks for an INSERT: the table exists, every assigned
/// column is declared and every value satisfies its declared type.
/// This is the central place the type validator is consulted from.
pub fn resolve_insert(
    table: &str,
    values: &[(String, String)],
    view: &dyn SchemaView,
) -> DbResult<()> {
    let columns = view
        .columns(table)
        .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

    for (name, value) in values {
        let column = columns
            .iter()
            .find(|c| c.name == *name)
            .ok_or_else(|| unknown_column(name, table))?;
        validator::validate_value(value, column.column_type).map_err(|e| {
            DbError::TypeMismatch(format!(
                "column '{}' expects {}: {}",
                name,
                column.column_type.as_sql(),
                e
            ))
        })?;
    }
    Ok(())
}

fn unknown_column(column: &str, table: &str) -> DbError {
    DbError::ColumnNotFound(format!(
        "column '{}' does not exist in table '{}'",
        column, table
    ))
}

#[cfg(test)]
mod test {
    use common::schema::ColumnType;

    use crate::parser::{parse, Statement};

    use super::*;

    struct FixedSchema;

    impl SchemaView for FixedSchema {
        fn table_exists(&self, table: &str) -> bool {
            table == "users"
        }

        fn columns(&self, table: &str) -> Option<Vec<Column>> {
            if table == "users" {
                Some(vec![
                    Column::new("id", ColumnType::Int),
                    Column::new("name", ColumnType::Varchar),
                ])
            } else {
                None
            }
        }
    }

    fn select(sql: &str) -> SelectQuery {
        match parse(sql).unwrap() {
            Statement::Select(q) => q,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn valid_select_resolves() {
        let q = select("SELECT id, name FROM users WHERE id = 1 ORDER BY name");
        assert!(resolve_select(&q, &FixedSchema).is_ok());
        let q = select("SELECT * FROM users");
        assert!(resolve_select(&q, &FixedSchema).is_ok());
    }

    #[test]
    fn unknown_table_and_column_fail() {
        let q = select("SELECT id FROM missing");
        assert!(matches!(
            resolve_select(&q, &FixedSchema),
            Err(DbError::TableNotFound(_))
        ));

        let q = select("SELECT age FROM users");
        assert!(matches!(
            resolve_select(&q, &FixedSchema),
            Err(DbError::ColumnNotFound(_))
        ));

        let q = select("SELECT * FROM users WHERE age = 1");
        assert!(matches!(
            resolve_select(&q, &FixedSchema),
            Err(DbError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn insert_values_type_check() {
        let values = vec![("id".to_string(), "1".to_string())];
        assert!(resolve_insert("users", &values, &FixedSchema).is_ok());

        let values = vec![("id".to_string(), "x".to_string())];
        match resolve_insert("users", &values, &FixedSchema) {
            Err(DbError::TypeMismatch(msg)) => {
                assert!(msg.contains("'id'"));
                assert!(msg.contains("INT"));
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }

        let values = vec![("age".to_string(), "1".to_string())];
        assert!(matches!(
            resolve_insert("users", &values, &FixedSchema),
            Err(DbError::ColumnNotFound(_))
        ));
    }
}
