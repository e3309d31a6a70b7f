use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use common::err::{DbError, DbResult};
use common::schema::{Column, ColumnType, Table, TableSchema};

use crate::codec::row;

/// Table file layout (`<table>.dat`):
/// ```txt
/// Header (24 bytes)
///   2 bytes  magic (0xDBF0)
///   2 bytes  version (= 1)
///   8 bytes  row count
///   4 bytes  column count
///   4 bytes  schema section length
///   4 bytes  reserved
/// Schema section, per column in order:
///   2 bytes  name length, UTF-8 name bytes, 1 byte type tag
/// Data section, per row:
///   4 bytes  field-payload length, fields in schema order
/// ```
/// All integers big-endian.
pub const TABLE_FILE_MAGIC: u16 = 0xDBF0;
pub const TABLE_FILE_VERSION: u16 = 1;
pub const TABLE_HEADER_SIZE: usize = 24;

pub fn encode_table(table: &Table) -> DbResult<Vec<u8>> {
    let mut schema_section = Vec::new();
    for col in table.schema.columns() {
        let name = col.name.as_bytes();
        if name.len() > u16::MAX as usize {
            return Err(DbError::Internal(format!(
                "column name of {} bytes cannot be stored",
                name.len()
            )));
        }
        schema_section.write_u16::<BigEndian>(name.len() as u16)?;
        schema_section.extend_from_slice(name);
        schema_section.push(col.column_type.tag());
    }

    let mut out = Vec::new();
    out.write_u16::<BigEndian>(TABLE_FILE_MAGIC)?;
    out.write_u16::<BigEndian>(TABLE_FILE_VERSION)?;
    out.write_u64::<BigEndian>(table.rows.len() as u64)?;
    out.write_u32::<BigEndian>(table.schema.len() as u32)?;
    out.write_u32::<BigEndian>(schema_section.len() as u32)?;
    out.write_u32::<BigEndian>(0)?; // reserved
    out.extend_from_slice(&schema_section);
    for r in &table.rows {
        out.extend_from_slice(&row::encode_row(r, &table.schema)?);
    }
    Ok(out)
}

/// Decodes a whole table file. `path` only labels errors. Magic and
/// version are verified before any other byte is trusted.
pub fn decode_table(name: &str, path: &str, data: &[u8]) -> DbResult<Table> {
    let corrupt = |reason: String| DbError::CorruptFile {
        path: path.to_string(),
        reason,
    };

    if data.len() < TABLE_HEADER_SIZE {
        return Err(corrupt(format!(
            "file is {} bytes, the header needs {}",
            data.len(),
            TABLE_HEADER_SIZE
        )));
    }
    let mut hdr = &data[..TABLE_HEADER_SIZE];
    let magic = hdr.read_u16::<BigEndian>()?;
    if magic != TABLE_FILE_MAGIC {
        return Err(corrupt(format!("bad magic 0x{:04x}", magic)));
    }
    let version = hdr.read_u16::<BigEndian>()?;
    if version != TABLE_FILE_VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }
    let row_count = hdr.read_u64::<BigEndian>()?;
    let column_count = hdr.read_u32::<BigEndian>()? as usize;
    let schema_len = hdr.read_u32::<BigEndian>()? as usize;
    let _reserved = hdr.read_u32::<BigEndian>()?;

    if data.len() < TABLE_HEADER_SIZE + schema_len {
        return Err(corrupt("schema section is truncated".to_string()));
    }
    let mut schema_bytes = &data[TABLE_HEADER_SIZE..TABLE_HEADER_SIZE + schema_len];
    let mut columns = Vec::with_capacity(column_count);
    for i in 0..column_count {
        if schema_bytes.len() < 2 {
            return Err(corrupt(format!("schema entry {} is truncated", i)));
        }
        let name_len = schema_bytes.read_u16::<BigEndian>()? as usize;
        if schema_bytes.len() < name_len + 1 {
            return Err(corrupt(format!("schema entry {} is truncated", i)));
        }
        let col_name = std::str::from_utf8(&schema_bytes[..name_len])
            .map_err(|_| corrupt(format!("schema entry {} name is not UTF-8", i)))?
            .to_string();
        let tag = schema_bytes[name_len];
        schema_bytes = &schema_bytes[name_len + 1..];
        let column_type =
            ColumnType::from_tag(tag).map_err(|e| corrupt(format!("schema entry {}: {}", i, e)))?;
        columns.push(Column::new(col_name, column_type));
    }
    let schema = TableSchema::new(columns);

    let mut rows = Vec::new();
    let mut offset = TABLE_HEADER_SIZE + schema_len;
    for i in 0..row_count {
        let (r, used) = row::decode_row(&data[offset..], &schema)
            .map_err(|e| corrupt(format!("row {}: {}", i, e)))?;
        rows.push(r);
        offset += used;
    }

    Ok(Table {
        name: name.to_string(),
        schema,
        rows,
    })
}
