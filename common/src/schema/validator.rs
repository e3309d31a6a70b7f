use crate::err::{DbError, DbResult};
use crate::schema::column_type::ColumnType;
use crate::time_util;

/// Checks a string-form value against a declared column type.
///
/// INT must parse as a signed 32-bit integer (no decimal point, no
/// surrounding spaces); VARCHAR always passes; BOOLEAN is a
/// case-insensitive `true`/`false`; TIMESTAMP accepts both
/// `YYYY-MM-DDTHH:MM:SSZ` and `YYYY-MM-DD HH:MM:SS`.
pub fn validate_value(value: &str, column_type: ColumnType) -> DbResult<()> {
    match column_type {
        ColumnType::Int => {
            if value.parse::<i32>().is_ok() {
                Ok(())
            } else {
                Err(DbError::TypeMismatch(format!(
                    "'{}' is not a valid INT",
                    value
                )))
            }
        }
        ColumnType::Varchar => Ok(()),
        ColumnType::Boolean => {
            if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
                Ok(())
            } else {
                Err(DbError::TypeMismatch(format!(
                    "'{}' is not a valid BOOLEAN",
                    value
                )))
            }
        }
        ColumnType::Timestamp => {
            if time_util::parse_timestamp_millis(value).is_some() {
                Ok(())
            } else {
                Err(DbError::TypeMismatch(format!(
                    "'{}' is not a valid TIMESTAMP",
                    value
                )))
            }
        }
    }
}

/// Same check from the declared type name; unknown names are rejected
/// with `UnsupportedType`. Type names match case-insensitively.
pub fn validate_decl(value: &str, decl: &str) -> DbResult<()> {
    validate_value(value, ColumnType::from_decl(decl)?)
}
