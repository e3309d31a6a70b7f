use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{error, info};

use common::err::{DbError, DbResult};
use common::schema::{validator, Column, Row, Table};

use crate::file_manager::TableFileManager;

/// Shared catalog + row store used by every connection.
///
/// All mutation happens while holding the map entry for the table, so
/// concurrent inserts never lose a row and the on-disk file always ends
/// at the newest append. Reads take a snapshot and never block writers
/// of other tables.
pub struct TableService {
    tables: DashMap<String, Arc<Table>>,
    file_manager: Option<Arc<TableFileManager>>,
}

impl TableService {
    /// Purely in-memory service, nothing survives the process.
    pub fn new() -> Self {
        TableService {
            tables: DashMap::new(),
            file_manager: None,
        }
    }

    /// Attaches persistent storage and loads every table the file
    /// manager can enumerate. A corrupt file is logged and skipped; it
    /// never prevents the remaining tables from loading.
    pub fn with_file_manager(file_manager: Arc<TableFileManager>) -> Self {
        let service = TableService {
            tables: DashMap::new(),
            file_manager: Some(file_manager),
        };
        service.load_tables();
        service
    }

    fn load_tables(&self) {
        let fm = match &self.file_manager {
            Some(fm) => fm,
            None => return,
        };
        let names = match fm.list_all_tables() {
            Ok(names) => names,
            Err(e) => {
                error!("cannot enumerate table files: {}", e);
                return;
            }
        };
        for name in names {
            match fm.read_table(&name) {
                Ok(Some(table)) => {
                    info!("loaded table '{}' ({} rows)", name, table.rows.len());
                    self.tables.insert(name, Arc::new(table));
                }
                Ok(None) => {}
                Err(e) => error!("skipping table '{}': {}", name, e),
            }
        }
    }

    /// Creates and persists a table; strict put-if-absent. When the
    /// name is already taken the first table silently stays and its
    /// canonical DDL echo is returned; callers that must surface
    /// duplicates check `table_exists` beforehand.
    pub fn create_table(&self, name: &str, columns: Vec<Column>) -> DbResult<String> {
        match self.tables.entry(name.to_string()) {
            Entry::Occupied(e) => Ok(e.get().ddl_string()),
            Entry::Vacant(v) => {
                let table = Arc::new(Table::new(name, columns));
                let ddl = table.ddl_string();
                if let Some(fm) = &self.file_manager {
                    fm.write_table(&table)?;
                }
                v.insert(table);
                Ok(ddl)
            }
        }
    }

    /// Validates every provided value against the schema, appends the
    /// row and persists, one atomic transition per table.
    pub fn insert(&self, name: &str, values: Row) -> DbResult<()> {
        let mut entry = match self.tables.get_mut(name) {
            Some(e) => e,
            None => return Err(DbError::TableNotFound(name.to_string())),
        };

        for (col, value) in &values {
            match entry.schema.column_type(col) {
                None => {
                    return Err(DbError::ColumnNotFound(format!(
                        "column '{}' does not exist in table '{}'",
                        col, name
                    )))
                }
                Some(ty) => {
                    if let Err(e) = validator::validate_value(value, ty) {
                        return Err(DbError::TypeMismatch(format!(
                            "column '{}' expects {}: {}",
                            col,
                            ty.as_sql(),
                            e
                        )));
                    }
                }
            }
        }

        Arc::make_mut(&mut *entry).rows.push(values);
        if let Some(fm) = &self.file_manager {
            if let Err(e) = fm.write_table(entry.value()) {
                // keep memory consistent with the ack the caller gets
                Arc::make_mut(&mut *entry).rows.pop();
                return Err(e);
            }
        }
        Ok(())
    }

    /// The latest persisted state when storage is attached, the
    /// in-memory copy otherwise. `None` for an unknown table.
    pub fn select(&self, name: &str) -> DbResult<Option<Table>> {
        match &self.file_manager {
            Some(fm) => fm.read_table(name),
            None => Ok(self.tables.get(name).map(|t| (**t).clone())),
        }
    }

    /// Atomically removes the table; deletes its file when it existed.
    pub fn drop_table(&self, name: &str) -> DbResult<bool> {
        match self.tables.remove(name) {
            Some(_) => {
                if let Some(fm) = &self.file_manager {
                    fm.delete_table(name)?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Snapshot of every live table.
    pub fn get_all_tables(&self) -> Vec<Arc<Table>> {
        self.tables.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

impl Default for TableService {
    fn default() -> Self {
        TableService::new()
    }
}
