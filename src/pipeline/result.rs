//! Outcome types returned by the coordinator.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::pipeline::Stage;
use crate::schema::{FlowStructure, FormulaPlan, RejectedFormula};
use crate::sheets::{SheetStats, SpreadsheetRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub request_id: String,
    pub prompt: String,
    pub structure: FlowStructure,
    pub formula_plan: FormulaPlan,
    #[serde(default)]
    pub rejected_formulas: Vec<RejectedFormula>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub sheet_stats: Vec<SheetStats>,
    #[serde(default)]
    pub spreadsheet: Option<SpreadsheetRef>,
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    /// Best-effort steps that degraded without failing the run.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ExecutionResult {
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }

    pub fn total_formulas(&self) -> usize {
        self.formula_plan.formulas.len()
    }
}

/// Structure and formula plan without materialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub request_id: String,
    pub structure: FlowStructure,
    pub formula_plan: FormulaPlan,
    pub rejected_formulas: Vec<RejectedFormula>,
}

/// Terminal failure of one run.
#[derive(Debug)]
pub struct WorkflowFailure {
    pub request_id: String,
    pub failed_stage: Stage,
    pub error: PipelineError,
    /// Failure record written for a spreadsheet the run left behind.
    pub failure_record: Option<PathBuf>,
    /// Spreadsheet created before the failure, complete or partial.
    pub spreadsheet: Option<SpreadsheetRef>,
}

impl fmt::Display for WorkflowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workflow {} failed during {} ({}): {}",
            self.request_id,
            self.failed_stage,
            self.error.kind().as_str(),
            self.error
        )
    }
}

impl std::error::Error for WorkflowFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
