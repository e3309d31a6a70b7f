use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use common::err::{DbError, DbResult};
use common::schema::ColumnType;
use common::time_util;

/// Appends the binary form of one field to `buf`.
///
/// INT is a 4-byte big-endian two's-complement; VARCHAR is a 2-byte
/// big-endian length followed by the UTF-8 bytes (at most 65535);
/// BOOLEAN is one byte; TIMESTAMP is an 8-byte big-endian count of
/// millis since the Unix epoch.
pub fn encode_field(value: &str, column_type: ColumnType, buf: &mut Vec<u8>) -> DbResult<()> {
    match column_type {
        ColumnType::Int => {
            let v = value
                .parse::<i32>()
                .map_err(|_| DbError::TypeMismatch(format!("'{}' is not a valid INT", value)))?;
            buf.write_i32::<BigEndian>(v)?;
        }
        ColumnType::Varchar => {
            let bytes = value.as_bytes();
            if bytes.len() > u16::MAX as usize {
                return Err(DbError::TypeMismatch(format!(
                    "VARCHAR value of {} bytes exceeds the 65535-byte limit",
                    bytes.len()
                )));
            }
            buf.write_u16::<BigEndian>(bytes.len() as u16)?;
            buf.extend_from_slice(bytes);
        }
        ColumnType::Boolean => {
            buf.push(if value.eq_ignore_ascii_case("true") {
                0x01
            } else {
                0x00
            });
        }
        ColumnType::Timestamp => {
            let ms = time_util::parse_timestamp_millis(value).ok_or_else(|| {
                DbError::TypeMismatch(format!("'{}' is not a valid TIMESTAMP", value))
            })?;
            buf.write_i64::<BigEndian>(ms)?;
        }
    }
    Ok(())
}

/// Decodes one field from the front of `data`, returning the string
/// form and the number of bytes consumed. TIMESTAMP decodes to the
/// ISO-8601 `Z` form. Truncated input fails, it is never padded.
pub fn decode_field(data: &[u8], column_type: ColumnType) -> DbResult<(String, usize)> {
    match column_type {
        ColumnType::Int => {
            ensure_len(data, 4, "INT")?;
            let v = (&data[..4]).read_i32::<BigEndian>()?;
            Ok((v.to_string(), 4))
        }
        ColumnType::Varchar => {
            ensure_len(data, 2, "VARCHAR length")?;
            let len = (&data[..2]).read_u16::<BigEndian>()? as usize;
            ensure_len(data, 2 + len, "VARCHAR payload")?;
            let text = std::str::from_utf8(&data[2..2 + len])
                .map_err(|_| DbError::Internal("VARCHAR payload is not valid UTF-8".to_string()))?;
            Ok((text.to_string(), 2 + len))
        }
        ColumnType::Boolean => {
            ensure_len(data, 1, "BOOLEAN")?;
            let text = if data[0] == 0x01 { "true" } else { "false" };
            Ok((text.to_string(), 1))
        }
        ColumnType::Timestamp => {
            ensure_len(data, 8, "TIMESTAMP")?;
            let ms = (&data[..8]).read_i64::<BigEndian>()?;
            let text = time_util::format_timestamp_millis(ms)
                .ok_or_else(|| DbError::Internal(format!("timestamp {} out of range", ms)))?;
            Ok((text, 8))
        }
    }
}

fn ensure_len(data: &[u8], need: usize, what: &str) -> DbResult<()> {
    if data.len() < need {
        return Err(DbError::Incomplete(format!(
            "{} needs {} bytes, {} available",
            what,
            need,
            data.len()
        )));
    }
    Ok(())
}
