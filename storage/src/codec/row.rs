use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use common::err::{DbError, DbResult};
use common::schema::{Row, TableSchema};

use crate::codec::field;

/// Encodes a row: a 4-byte big-endian field-payload length, then every
/// column in schema order. Fails when a declared column is absent from
/// the row.
pub fn encode_row(row: &Row, schema: &TableSchema) -> DbResult<Vec<u8>> {
    let mut payload = Vec::new();
    for col in schema.columns() {
        let value = row.get(&col.name).ok_or_else(|| {
            DbError::ColumnNotFound(format!("row is missing declared column '{}'", col.name))
        })?;
        field::encode_field(value, col.column_type, &mut payload)?;
    }
    let mut out = Vec::with_capacity(4 + payload.len());
    out.write_u32::<BigEndian>(payload.len() as u32)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes one row from the front of `data`, returning it and the
/// total bytes consumed, length prefix included.
pub fn decode_row(data: &[u8], schema: &TableSchema) -> DbResult<(Row, usize)> {
    if data.len() < 4 {
        return Err(DbError::Incomplete(format!(
            "row length prefix needs 4 bytes, {} available",
            data.len()
        )));
    }
    let payload_len = (&data[..4]).read_u32::<BigEndian>()? as usize;
    if data.len() < 4 + payload_len {
        return Err(DbError::Incomplete(format!(
            "row payload needs {} bytes, {} available",
            payload_len,
            data.len() - 4
        )));
    }

    let payload = &data[4..4 + payload_len];
    let mut row = Row::new();
    let mut offset = 0usize;
    for col in schema.columns() {
        let (value, used) = field::decode_field(&payload[offset..], col.column_type)?;
        row.insert(col.name.clone(), value);
        offset += used;
    }
    if offset != payload_len {
        return Err(DbError::Incomplete(format!(
            "row payload declares {} bytes but fields span {}",
            payload_len, offset
        )));
    }
    Ok((row, 4 + payload_len))
}

#[cfg(test)]
mod test {
    use common::schema::{Column, ColumnType};

    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::new("id", ColumnType::Int),
            Column::new("name", ColumnType::Varchar),
            Column::new("active", ColumnType::Boolean),
        ])
    }

    fn row(id: &str, name: &str, active: &str) -> Row {
        let mut r = Row::new();
        r.insert("id".into(), id.into());
        r.insert("name".into(), name.into());
        r.insert("active".into(), active.into());
        r
    }

    #[test]
    fn round_trip() {
        let s = schema();
        let r = row("7", "Jane", "true");
        let bytes = encode_row(&r, &s).unwrap();
        let (decoded, used) = decode_row(&bytes, &s).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, r);
    }

    #[test]
    fn missing_column_fails() {
        let s = schema();
        let mut r = Row::new();
        r.insert("id".into(), "7".into());
        assert!(matches!(
            encode_row(&r, &s),
            Err(DbError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn truncated_payload_fails() {
        let s = schema();
        let bytes = encode_row(&row("7", "Jane", "false"), &s).unwrap();
        assert!(decode_row(&bytes[..bytes.len() - 1], &s).is_err());
        assert!(decode_row(&bytes[..3], &s).is_err());
    }

    #[test]
    fn length_prefix_mismatch_fails() {
        let s = schema();
        let mut bytes = encode_row(&row("7", "Jane", "false"), &s).unwrap();
        // declare one byte more payload than the fields span
        let declared = (bytes.len() - 4 + 1) as u32;
        bytes[..4].copy_from_slice(&declared.to_be_bytes());
        bytes.push(0x00);
        assert!(decode_row(&bytes, &s).is_err());
    }
}
