use std::collections::{HashMap, HashSet};

use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};

use common::schema::{Row, Table};

/// Per-column statistics. The incremental path approximates
/// distinct-count as +1 per non-null value, which overcounts;
/// [`TableStatistics::rebuild`] recomputes exact figures from rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters, Setters)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStatistics {
    #[getset(get = "pub", set = "pub")]
    distinct_count: u64,

    #[getset(get = "pub", set = "pub")]
    null_count: u64,

    #[getset(get = "pub")]
    min_value: Option<String>,

    #[getset(get = "pub")]
    max_value: Option<String>,

    #[getset(get = "pub")]
    avg_length: Option<f64>,
}

impl ColumnStatistics {
    /// Accounts one observed non-null value.
    pub fn record_value(&mut self, value: &str) {
        self.distinct_count += 1;

        let len = value.len() as f64;
        let seen = self.distinct_count as f64;
        self.avg_length = Some(match self.avg_length {
            None => len,
            Some(avg) => avg + (len - avg) / seen,
        });

        match &self.min_value {
            Some(min) if min.as_str() <= value => {}
            _ => self.min_value = Some(value.to_string()),
        }
        match &self.max_value {
            Some(max) if max.as_str() >= value => {}
            _ => self.max_value = Some(value.to_string()),
        }
    }

    /// Accounts one row where the column was absent.
    pub fn record_null(&mut self) {
        self.null_count += 1;
    }
}

/// Statistics of one table, fed incrementally on insert and rebuilt
/// exactly at startup load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters, Setters)]
#[serde(rename_all = "camelCase")]
pub struct TableStatistics {
    #[getset(get = "pub")]
    table_name: String,

    #[getset(get = "pub", set = "pub")]
    total_rows: u64,

    #[getset(get = "pub")]
    columns: HashMap<String, ColumnStatistics>,

    #[getset(get = "pub", set = "pub")]
    updated_at: i64,
}

impl TableStatistics {
    pub fn new(table_name: impl Into<String>, now: i64) -> Self {
        TableStatistics {
            table_name: table_name.into(),
            total_rows: 0,
            columns: HashMap::new(),
            updated_at: now,
        }
    }

    pub fn column_mut(&mut self, name: &str) -> &mut ColumnStatistics {
        self.columns.entry(name.to_string()).or_default()
    }

    /// Incremental update for one inserted row: total-rows +1, every
    /// present column counts its value, every missing column counts a
    /// null.
    pub fn record_insert(&mut self, schema_columns: &[String], values: &Row, now: i64) {
        self.total_rows += 1;
        self.updated_at = now;
        for column in schema_columns {
            match values.get(column) {
                Some(value) => self.column_mut(column).record_value(value),
                None => self.column_mut(column).record_null(),
            }
        }
    }

    /// Exact recount over the rows of a loaded table.
    pub fn rebuild(table: &Table, now: i64) -> Self {
        let mut stats = TableStatistics::new(&table.name, now);
        stats.total_rows = table.rows.len() as u64;

        for column in table.schema.columns() {
            let mut distinct: HashSet<&str> = HashSet::new();
            let mut nulls = 0u64;
            let mut total_len = 0usize;
            let mut seen = 0u64;
            let mut min: Option<&str> = None;
            let mut max: Option<&str> = None;

            for row in &table.rows {
                match row.get(&column.name) {
                    Some(value) => {
                        distinct.insert(value.as_str());
                        total_len += value.len();
                        seen += 1;
                        if min.map_or(true, |m| value.as_str() < m) {
                            min = Some(value);
                        }
                        if max.map_or(true, |m| value.as_str() > m) {
                            max = Some(value);
                        }
                    }
                    None => nulls += 1,
                }
            }

            let col_stats = stats.column_mut(&column.name);
            col_stats.distinct_count = distinct.len() as u64;
            col_stats.null_count = nulls;
            col_stats.min_value = min.map(|s| s.to_string());
            col_stats.max_value = max.map(|s| s.to_string());
            col_stats.avg_length = if seen > 0 {
                Some(total_len as f64 / seen as f64)
            } else {
                None
            };
        }
        stats
    }

    /// `1 / distinct-count`, worst-case `1.0` when the column has no
    /// usable distinct count.
    pub fn selectivity(&self, column: &str) -> f64 {
        match self.columns.get(column) {
            Some(stats) if stats.distinct_count > 0 => 1.0 / stats.distinct_count as f64,
            _ => 1.0,
        }
    }
}
