//! Persisted project records: `metadata.json`, the combined schema, and `failure.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::pipeline::{ExecutionResult, Stage};
use crate::schema::{FlowStructure, FormulaPlan};
use crate::sheets::SpreadsheetRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_info: ProjectInfo,
    #[serde(default)]
    pub spreadsheet: Option<SpreadsheetRef>,
    pub system: SystemInfo,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub prompt: String,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub execution_time_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    pub total_sheets: usize,
    #[serde(default)]
    pub workflow_stages: Vec<String>,
    #[serde(default)]
    pub integrations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_columns: usize,
    pub total_formulas: usize,
    #[serde(default)]
    pub rejected_formulas: usize,
    pub sheets_with_relationships: usize,
}

impl ProjectMetadata {
    pub fn from_result(result: &ExecutionResult) -> Self {
        let structure = &result.structure;
        Self {
            project_info: ProjectInfo {
                prompt: result.prompt.clone(),
                request_id: result.request_id.clone(),
                created_at: result.started_at,
                completed_at: result.completed_at,
                execution_time_seconds: result.elapsed_seconds(),
            },
            spreadsheet: result.spreadsheet.clone(),
            system: SystemInfo {
                name: structure.system_name.clone(),
                description: structure.description.clone(),
                version: structure.version.clone(),
                total_sheets: structure.sheets.len(),
                workflow_stages: structure.workflow_stages.clone(),
                integrations: structure.integrations.clone(),
            },
            statistics: Statistics {
                total_columns: structure.total_columns(),
                total_formulas: result.total_formulas(),
                rejected_formulas: result.rejected_formulas.len(),
                sheets_with_relationships: structure
                    .sheets
                    .iter()
                    .filter(|s| !s.relationships.is_empty())
                    .count(),
            },
        }
    }
}

/// `schemas/complete_schema.json` body.
pub fn complete_schema(result: &ExecutionResult, metadata: &ProjectMetadata) -> Value {
    json!({
        "flow": result.structure,
        "formulas": result.formula_plan,
        "metadata": metadata,
    })
}

/// Record of a run that failed after creating a spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub request_id: String,
    pub prompt: String,
    pub failed_stage: Stage,
    pub error_kind: String,
    pub error: String,
    #[serde(default)]
    pub spreadsheet: Option<SpreadsheetRef>,
    pub recorded_at: DateTime<Utc>,
    pub structure: FlowStructure,
    pub formula_plan: FormulaPlan,
}

impl FailureRecord {
    pub fn new(
        request_id: &str,
        prompt: &str,
        failed_stage: Stage,
        error: &PipelineError,
        structure: &FlowStructure,
        formula_plan: &FormulaPlan,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            prompt: prompt.to_string(),
            failed_stage,
            error_kind: error.kind().as_str().to_string(),
            error: error.to_string(),
            spreadsheet: error.partial_spreadsheet_id().map(SpreadsheetRef::from_id),
            recorded_at: Utc::now(),
            structure: structure.clone(),
            formula_plan: formula_plan.clone(),
        }
    }

    pub fn with_spreadsheet(mut self, spreadsheet: SpreadsheetRef) -> Self {
        self.spreadsheet = Some(spreadsheet);
        self
    }
}
