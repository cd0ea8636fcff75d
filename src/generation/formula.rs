//! Formula Generator: validated structure in, filtered `FormulaPlan` out.
//!
//! Candidates are judged one at a time. A bad candidate is dropped and recorded; it never fails
//! the batch.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::generation::prompts::{formula_user_message, FORMULA_SYSTEM_PROMPT};
use crate::generation::retry::RetryPolicy;
use crate::pipeline::Stage;
use crate::provider::{ChatMessage, CompletionClient, CompletionOptions};
use crate::schema::{
    extract_json, FlowStructure, FormulaDefinition, FormulaPlan, RawFormula, RejectedFormula,
};
use crate::telemetry::{EventEmitter, EventLevel};

/// Kept plan plus the candidates that were discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaOutcome {
    pub plan: FormulaPlan,
    pub rejected: Vec<RejectedFormula>,
}

pub struct FormulaGenerator {
    client: Arc<dyn CompletionClient>,
    options: CompletionOptions,
    retry: RetryPolicy,
    /// Rows in each generated tab; formulas must start inside it.
    grid_rows: u32,
}

impl FormulaGenerator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        options: CompletionOptions,
        retry: RetryPolicy,
        grid_rows: u32,
    ) -> Self {
        Self {
            client,
            options,
            retry,
            grid_rows,
        }
    }

    pub async fn generate(
        &self,
        structure: &FlowStructure,
        events: &EventEmitter,
    ) -> Result<FormulaOutcome, PipelineError> {
        let messages = vec![
            ChatMessage::system(FORMULA_SYSTEM_PROMPT),
            ChatMessage::user(formula_user_message(structure)),
        ];

        let response = self
            .retry
            .run(
                "formula generation",
                || self.client.complete(messages.clone(), self.options.clone()),
                |attempt, err, delay| {
                    events.emit_with_data(
                        Stage::Formula,
                        EventLevel::Warn,
                        format!("Completion attempt {} failed, retrying: {}", attempt, err),
                        json!({ "attempt": attempt, "delay_ms": delay.as_millis() as u64 }),
                    )
                },
            )
            .await?;

        debug!(
            request_id = events.request_id(),
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Formula completion received"
        );

        let outcome = parse_formulas(structure, &response.content, self.grid_rows)?;
        for rejected in &outcome.rejected {
            warn!(
                request_id = events.request_id(),
                sheet = %rejected.sheet,
                column = %rejected.column,
                reason = %rejected.reason,
                "Discarding formula candidate"
            );
            events.emit_with_data(
                Stage::Formula,
                EventLevel::Warn,
                format!(
                    "Discarded formula for {}.{}: {}",
                    rejected.sheet, rejected.column, rejected.reason
                ),
                json!(rejected),
            );
        }
        Ok(outcome)
    }
}

/// Decode the model's formula response and filter it against `structure`.
pub fn parse_formulas(
    structure: &FlowStructure,
    content: &str,
    grid_rows: u32,
) -> Result<FormulaOutcome, PipelineError> {
    let json = extract_json(content)?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|e| PipelineError::Generation(format!("Formula response is not JSON: {}", e)))?;
    let entries = value
        .get("formulas")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            PipelineError::Generation(
                "Formula response must be an object with a `formulas` array".to_string(),
            )
        })?;

    let mut candidates = Vec::with_capacity(entries.len());
    let mut undecodable = Vec::new();
    for entry in entries {
        match serde_json::from_value::<RawFormula>(entry.clone()) {
            Ok(raw) => candidates.push(into_definition(raw)),
            Err(e) => undecodable.push(RejectedFormula {
                sheet: text_field(entry, &["sheet"]),
                column: text_field(entry, &["column", "target_column"]),
                reason: format!("could not decode candidate: {}", e),
            }),
        }
    }

    let mut outcome = filter_formulas(structure, candidates, grid_rows);
    undecodable.append(&mut outcome.rejected);
    outcome.rejected = undecodable;
    Ok(outcome)
}

fn text_field(entry: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}

fn into_definition(raw: RawFormula) -> FormulaDefinition {
    FormulaDefinition {
        sheet: raw.sheet.trim().to_string(),
        column: raw.column.trim().to_string(),
        start_row: raw.start_row,
        expression: raw.expression.trim().to_string(),
        rationale: raw.rationale.unwrap_or_default().trim().to_string(),
        dependencies: raw
            .dependencies
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect(),
        auto_fill: raw.auto_fill,
    }
}

/// Keep the candidates that bind to real sheets, columns and rows; record the rest.
///
/// `grid_rows` is the row count of every tab. Pure and idempotent: filtering the kept plan
/// again keeps all of it.
pub fn filter_formulas(
    structure: &FlowStructure,
    candidates: Vec<FormulaDefinition>,
    grid_rows: u32,
) -> FormulaOutcome {
    let mut outcome = FormulaOutcome::default();
    let mut targets: HashSet<(String, String)> = HashSet::new();

    for formula in candidates {
        match check_formula(structure, &formula, &targets, grid_rows) {
            Ok(()) => {
                targets.insert((formula.sheet.clone(), formula.column.clone()));
                outcome.plan.formulas.push(formula);
            }
            Err(reason) => outcome.rejected.push(RejectedFormula {
                sheet: formula.sheet,
                column: formula.column,
                reason,
            }),
        }
    }
    outcome
}

fn check_formula(
    structure: &FlowStructure,
    formula: &FormulaDefinition,
    targets: &HashSet<(String, String)>,
    grid_rows: u32,
) -> Result<(), String> {
    let sheet = structure
        .sheet(&formula.sheet)
        .ok_or_else(|| format!("sheet '{}' does not exist", formula.sheet))?;
    if sheet.column(&formula.column).is_none() {
        return Err(format!(
            "column '{}' does not exist on sheet '{}'",
            formula.column, sheet.name
        ));
    }
    if let Some(missing) = formula
        .dependencies
        .iter()
        .find(|dep| !dependency_resolves(structure, &sheet.name, dep))
    {
        return Err(format!("dependency '{}' does not resolve", missing));
    }
    if formula.expression.trim().is_empty() {
        return Err("expression is empty".to_string());
    }
    if !formula.expression.trim_start().starts_with('=') {
        return Err("expression does not start with '='".to_string());
    }
    if formula.start_row < 2 {
        return Err(format!(
            "start_row {} would overwrite the header row",
            formula.start_row
        ));
    }
    if formula.start_row > grid_rows {
        return Err(format!(
            "start_row {} is outside the {}-row grid",
            formula.start_row, grid_rows
        ));
    }
    if targets.contains(&(formula.sheet.clone(), formula.column.clone())) {
        return Err("column already has a formula".to_string());
    }
    Ok(())
}

/// A dependency is a column of the formula's own sheet, or `Sheet.column` / `Sheet!column`.
fn dependency_resolves(structure: &FlowStructure, own_sheet: &str, dependency: &str) -> bool {
    let dependency = dependency.trim();
    if structure
        .sheet(own_sheet)
        .map_or(false, |s| s.column(dependency).is_some())
    {
        return true;
    }
    dependency
        .char_indices()
        .filter(|(_, c)| *c == '.' || *c == '!')
        .any(|(i, _)| {
            let sheet_name = dependency[..i].trim().trim_matches('\'');
            let column = dependency[i + 1..].trim();
            structure
                .sheet(sheet_name)
                .map_or(false, |s| s.column(column).is_some())
        })
}
