//! Workflow presentation: create, plan, batch and validate output.

use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;

use crate::pipeline::{ExecutionResult, PlanResult};
use crate::schema::{FlowStructure, FormulaPlan, RejectedFormula};

fn structure_table(structure: &FlowStructure, plan: &FormulaPlan) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Sheet", "Columns", "Formulas", "Primary key", "Related to"]);
    for sheet in &structure.sheets {
        let formulas = plan.formulas.iter().filter(|f| f.sheet == sheet.name).count();
        table.add_row(vec![
            sheet.name.clone(),
            sheet.columns.len().to_string(),
            formulas.to_string(),
            sheet.primary_key.clone().unwrap_or_else(|| "-".to_string()),
            if sheet.relationships.is_empty() {
                "-".to_string()
            } else {
                sheet.relationships.join(", ")
            },
        ]);
    }
    table
}

fn push_rejected(out: &mut String, rejected: &[RejectedFormula]) {
    if rejected.is_empty() {
        return;
    }
    out.push_str(&format!("\nDiscarded formulas ({}):\n", rejected.len()));
    for r in rejected {
        out.push_str(&format!("  - {}.{}: {}\n", r.sheet, r.column, r.reason));
    }
}

pub fn format_execution_text(result: &ExecutionResult) -> String {
    let mut out = format!(
        "{}\n\n",
        format!("✓ {}", result.structure.system_name).green().bold()
    );
    if let Some(sheet) = &result.spreadsheet {
        out.push_str(&format!("Spreadsheet: {}\n", sheet.edit_url));
    }
    if let Some(dir) = &result.project_dir {
        out.push_str(&format!("Project:     {}\n", dir.display()));
    }
    out.push_str(&format!(
        "Request:     {} ({:.2}s)\n\n",
        result.request_id,
        result.elapsed_seconds()
    ));
    out.push_str(&structure_table(&result.structure, &result.formula_plan).to_string());
    out.push('\n');
    push_rejected(&mut out, &result.rejected_formulas);
    if !result.warnings.is_empty() {
        out.push_str(&format!("\nWarnings ({}):\n", result.warnings.len()));
        for w in &result.warnings {
            out.push_str(&format!("  - {}\n", w.yellow()));
        }
    }
    out
}

pub fn format_plan_text(plan: &PlanResult) -> String {
    let mut out = format!(
        "{} (plan only, request {})\n\n",
        plan.structure.system_name.bold(),
        plan.request_id
    );
    out.push_str(&structure_table(&plan.structure, &plan.formula_plan).to_string());
    out.push('\n');
    for f in &plan.formula_plan.formulas {
        out.push_str(&format!("  {}.{} = {}\n", f.sheet, f.column, f.expression));
    }
    push_rejected(&mut out, &plan.rejected_formulas);
    out
}

/// One prompt's outcome in a batch run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchEntry {
    pub prompt: String,
    pub request_id: String,
    pub ok: bool,
    /// Spreadsheet URL on success, error message otherwise.
    pub detail: String,
}

pub fn format_batch_text(entries: &[BatchEntry]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Prompt", "Request", "Status", "Result"]);
    for e in entries {
        table.add_row(vec![
            e.prompt.chars().take(40).collect::<String>(),
            e.request_id.clone(),
            if e.ok { "ok".to_string() } else { "failed".to_string() },
            e.detail.clone(),
        ]);
    }
    let failed = entries.iter().filter(|e| !e.ok).count();
    format!(
        "{}\n{} succeeded, {} failed",
        table,
        entries.len() - failed,
        failed
    )
}

pub fn format_validation_text(structure: &FlowStructure) -> String {
    format!(
        "Valid structure '{}': {} sheets, {} columns",
        structure.system_name,
        structure.sheets.len(),
        structure.total_columns()
    )
}
