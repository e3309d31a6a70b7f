use serde::{Deserialize, Serialize};

/// Scan strategy of one execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    TableScan,
    IndexScan,
    CoveredIndexScan,
}

/// One row of the execution plan, a single scan choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub step_id: u32,
    pub step_type: StepType,
    pub table_name: String,
    pub index_used: Option<String>,
    pub filter: Option<String>,
    pub accessed_columns: Vec<String>,
    pub estimated_cost: f64,
    pub estimated_rows: u64,
    pub is_covered: bool,
    pub description: String,
}

/// Planner output; persisted in the metadata store keyed by
/// `query_hash` and served back for identical SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub plan_id: String,
    pub query_hash: String,
    pub execution_steps: Vec<ExecutionStep>,
    pub estimated_total_cost: f64,
    pub estimated_rows: u64,
    pub is_covered: bool,
    pub generated_at: i64,
}
