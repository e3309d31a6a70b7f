use std::sync::Arc;

use md5::{Digest, Md5};
use tracing::debug;
use uuid::Uuid;

use common::err::{DbError, DbResult};
use common::time_util;
use sql::parser::{parse, Condition, Operator, SelectQuery, Statement};

use crate::catalog::store::MetadataStore;
use crate::plan::{ExecutionStep, QueryPlan, StepType};

/// A full scan wins once an equality predicate keeps this fraction of
/// the table or more; scattered index lookups only pay off below it.
const SELECTIVITY_THRESHOLD: f64 = 0.15;

/// Cost-based EXPLAIN pipeline: parse → resolve the table → expand `*`
/// → index decision on the first WHERE condition → cost. Pure
/// analysis; the query is never executed, and identical catalog and
/// statistics yield identical steps.
pub struct QueryPlanner {
    store: Arc<dyn MetadataStore>,
}

impl QueryPlanner {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        QueryPlanner { store }
    }

    pub fn explain(&self, sql_text: &str) -> DbResult<QueryPlan> {
        let query_hash = query_hash(sql_text);
        if let Some(plan) = self.store.get_plan_by_hash(&query_hash) {
            debug!("plan cache hit for {}", query_hash);
            return Ok(plan);
        }

        let query = match parse(sql_text)? {
            Statement::Select(q) => q,
            // tolerate a text still carrying its EXPLAIN prefix
            Statement::Explain(q) => q,
            _ => {
                return Err(DbError::Parse(
                    "EXPLAIN expects a SELECT statement".to_string(),
                ))
            }
        };

        let columns = self
            .store
            .get_columns(&query.table_name)
            .ok_or_else(|| DbError::TableNotFound(query.table_name.clone()))?;

        // SELECT * expands to the declared column order
        let select_columns: Vec<String> = if query.select_columns.iter().any(|c| c == "*") {
            columns.iter().map(|c| c.name.clone()).collect()
        } else {
            query.select_columns.clone()
        };

        let total_rows = self
            .store
            .get_statistics(&query.table_name)
            .map(|s| *s.total_rows())
            .unwrap_or(0);

        let step = self.plan_scan(&query, &select_columns, total_rows);
        let estimated_total_cost = step.estimated_cost;
        let estimated_rows = step.estimated_rows;
        let is_covered = step.is_covered;

        let plan = QueryPlan {
            plan_id: Uuid::new_v4().to_string(),
            query_hash,
            execution_steps: vec![step],
            estimated_total_cost,
            estimated_rows,
            is_covered,
            generated_at: time_util::now_millis(),
        };
        self.store.save_plan(&plan);
        Ok(plan)
    }

    /// The single scan choice: only the first WHERE condition steers
    /// it, and an index is usable only when its leading column equals
    /// that condition's column.
    fn plan_scan(
        &self,
        query: &SelectQuery,
        select_columns: &[String],
        total_rows: u64,
    ) -> ExecutionStep {
        let table = &query.table_name;
        let first_condition = query.where_conditions.first();

        let mut index_used = None;
        let mut selectivity = 1.0;
        let step_type;
        let description;

        match first_condition {
            None => {
                step_type = StepType::TableScan;
                description = format!("Full table scan on {} (no filter)", table);
            }
            Some(condition) => {
                let usable: Vec<_> = self
                    .store
                    .get_indexes_for_column(table, &condition.column)
                    .into_iter()
                    .filter(|idx| idx.leading_column() == Some(condition.column.as_str()))
                    .collect();
                selectivity = self
                    .store
                    .calculate_selectivity(table, &condition.column);

                if usable.is_empty() {
                    step_type = StepType::TableScan;
                    description = format!(
                        "Full table scan on {} (No index on column {})",
                        table, condition.column
                    );
                } else if selectivity >= SELECTIVITY_THRESHOLD {
                    step_type = StepType::TableScan;
                    description = format!(
                        "Full table scan on {} (High selectivity, the index would not pay off)",
                        table
                    );
                } else {
                    let index = &usable[0];
                    if index.covers(select_columns) {
                        step_type = StepType::CoveredIndexScan;
                        description = format!(
                            "Covered index scan using {} on {} (index-only access)",
                            index.index_name, table
                        );
                    } else {
                        step_type = StepType::IndexScan;
                        description =
                            format!("Index scan using {} on {}", index.index_name, table);
                    }
                    index_used = Some(index.index_name.clone());
                }
            }
        }

        let estimated_rows = match first_condition {
            None => total_rows,
            Some(_) => (total_rows as f64 * selectivity) as u64,
        };
        let estimated_cost = match step_type {
            StepType::TableScan => total_rows as f64,
            StepType::IndexScan | StepType::CoveredIndexScan => {
                log2(total_rows) + total_rows as f64 * selectivity
            }
        };

        ExecutionStep {
            step_id: 1,
            step_type,
            table_name: table.clone(),
            index_used,
            filter: first_condition.map(format_filter),
            accessed_columns: select_columns.to_vec(),
            estimated_cost,
            estimated_rows,
            is_covered: step_type == StepType::CoveredIndexScan,
            description,
        }
    }
}

fn format_filter(condition: &Condition) -> String {
    match condition.operator {
        Operator::IsNull | Operator::IsNotNull => {
            format!("{} {}", condition.column, condition.operator)
        }
        _ => format!(
            "{} {} {}",
            condition.column, condition.operator, condition.value
        ),
    }
}

fn log2(n: u64) -> f64 {
    if n == 0 {
        0.0
    } else {
        (n as f64).log2()
    }
}

/// Lowercase-hex MD5 of the raw SQL text, the deterministic plan
/// cache key.
pub fn query_hash(sql_text: &str) -> String {
    hex::encode(Md5::digest(sql_text.as_bytes()))
}
