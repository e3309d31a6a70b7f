use dashmap::DashMap;
use tracing::debug;

use common::schema::{Column, Row, Table};
use common::time_util;
use sql::resolver::SchemaView;

use crate::catalog::index_metadata::IndexMetadata;
use crate::catalog::statistics::TableStatistics;
use crate::catalog::table_metadata::{ColumnMeta, MetadataStatus, TableMetadata};
use crate::plan::QueryPlan;

/// Write-through document store for table metadata, index metadata,
/// column statistics and cached query plans. The planner and resolver
/// consume it through this interface; the backing medium is free to
/// change.
pub trait MetadataStore: Send + Sync {
    fn table_exists(&self, table: &str) -> bool;

    /// The Active document for a table name.
    fn get_table(&self, table: &str) -> Option<TableMetadata>;

    fn get_columns(&self, table: &str) -> Option<Vec<ColumnMeta>>;

    /// Active indexes of `table` containing `column` anywhere in their
    /// column list.
    fn get_indexes_for_column(&self, table: &str, column: &str) -> Vec<IndexMetadata>;

    fn get_active_indexes(&self, table: &str) -> Vec<IndexMetadata>;

    fn get_statistics(&self, table: &str) -> Option<TableStatistics>;

    /// `1 / distinct-count`, `1.0` when no statistics help.
    fn calculate_selectivity(&self, table: &str, column: &str) -> f64;

    fn save_table(&self, meta: TableMetadata);

    fn save_index(&self, meta: IndexMetadata);

    fn save_statistics(&self, stats: TableStatistics);

    /// Soft delete: the table document and its indexes flip to
    /// Dropped but are retained.
    fn drop_table(&self, table: &str);

    /// Incremental statistics update for one inserted row.
    fn record_insert(&self, table: &str, values: &Row);

    /// Registers a live table: metadata document plus exact statistics
    /// rebuilt from its rows.
    fn register_table(&self, table: &Table);

    fn save_plan(&self, plan: &QueryPlan);

    fn get_plan_by_hash(&self, query_hash: &str) -> Option<QueryPlan>;
}

/// Dashmap-backed store; everything lives in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    tables: DashMap<String, TableMetadata>,
    indexes: DashMap<String, IndexMetadata>,
    statistics: DashMap<String, TableStatistics>,
    plans: DashMap<String, QueryPlan>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        InMemoryMetadataStore::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn table_exists(&self, table: &str) -> bool {
        self.get_table(table).is_some()
    }

    fn get_table(&self, table: &str) -> Option<TableMetadata> {
        let meta = self.tables.get(table)?;
        if meta.is_active() {
            Some(meta.value().clone())
        } else {
            None
        }
    }

    fn get_columns(&self, table: &str) -> Option<Vec<ColumnMeta>> {
        self.get_table(table).map(|meta| meta.columns)
    }

    fn get_indexes_for_column(&self, table: &str, column: &str) -> Vec<IndexMetadata> {
        self.indexes
            .iter()
            .filter(|e| {
                e.is_active() && e.table_name == table && e.contains_column(column)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    fn get_active_indexes(&self, table: &str) -> Vec<IndexMetadata> {
        self.indexes
            .iter()
            .filter(|e| e.is_active() && e.table_name == table)
            .map(|e| e.value().clone())
            .collect()
    }

    fn get_statistics(&self, table: &str) -> Option<TableStatistics> {
        self.statistics.get(table).map(|s| s.value().clone())
    }

    fn calculate_selectivity(&self, table: &str, column: &str) -> f64 {
        match self.statistics.get(table) {
            Some(stats) => stats.selectivity(column),
            None => 1.0,
        }
    }

    fn save_table(&self, meta: TableMetadata) {
        self.tables.insert(meta.table_name.clone(), meta);
    }

    fn save_index(&self, meta: IndexMetadata) {
        self.indexes.insert(meta.index_name.clone(), meta);
    }

    fn save_statistics(&self, stats: TableStatistics) {
        self.statistics.insert(stats.table_name().clone(), stats);
    }

    fn drop_table(&self, table: &str) {
        if let Some(mut meta) = self.tables.get_mut(table) {
            meta.status = MetadataStatus::Dropped;
            meta.updated_at = time_util::now_millis();
        }
        for mut index in self.indexes.iter_mut() {
            if index.table_name == table {
                index.status = MetadataStatus::Dropped;
            }
        }
        self.statistics.remove(table);
        debug!("catalog dropped table '{}'", table);
    }

    fn record_insert(&self, table: &str, values: &Row) {
        let schema_columns: Vec<String> = match self.get_table(table) {
            Some(meta) => meta.columns.iter().map(|c| c.name.clone()).collect(),
            None => return,
        };
        let now = time_util::now_millis();

        self.statistics
            .entry(table.to_string())
            .or_insert_with(|| TableStatistics::new(table, now))
            .record_insert(&schema_columns, values, now);

        if let Some(mut meta) = self.tables.get_mut(table) {
            meta.estimated_row_count += 1;
            meta.updated_at = now;
        }
    }

    fn register_table(&self, table: &Table) {
        let now = time_util::now_millis();
        let columns = table
            .schema
            .columns()
            .iter()
            .map(|c| ColumnMeta::new(&c.name, c.column_type))
            .collect();
        let mut meta = TableMetadata::new(&table.name, columns, now);
        meta.estimated_row_count = table.rows.len() as u64;
        self.save_table(meta);
        self.save_statistics(TableStatistics::rebuild(table, now));
    }

    fn save_plan(&self, plan: &QueryPlan) {
        self.plans.insert(plan.query_hash.clone(), plan.clone());
    }

    fn get_plan_by_hash(&self, query_hash: &str) -> Option<QueryPlan> {
        self.plans.get(query_hash).map(|p| p.value().clone())
    }
}

impl SchemaView for InMemoryMetadataStore {
    fn table_exists(&self, table: &str) -> bool {
        MetadataStore::table_exists(self, table)
    }

    fn columns(&self, table: &str) -> Option<Vec<Column>> {
        self.get_columns(table).map(|cols| {
            cols.into_iter()
                .map(|c| Column::new(c.name, c.column_type))
                .collect()
        })
    }
}
