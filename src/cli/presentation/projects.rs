//! Project store presentation: list table, show and failure records.

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

use crate::docs::{FailureRecord, ProjectRecord, ProjectStatus, ProjectSummary};

pub fn format_project_list_text(projects: &[ProjectSummary]) -> String {
    if projects.is_empty() {
        return "No projects found.\n\nUse 'flowsheet create \"...\"' to generate one.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["ID", "System", "Status", "Sheets", "Created", "Spreadsheet"]);
    for p in projects {
        table.add_row(vec![
            p.id.clone(),
            p.system_name.clone(),
            match p.status {
                ProjectStatus::Complete => "complete".to_string(),
                ProjectStatus::Failed => "failed".to_string(),
            },
            p.sheets.to_string(),
            p.created_at.format("%Y-%m-%d %H:%M").to_string(),
            p.spreadsheet_url.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    format!("{}\nTotal: {} project(s)", table, projects.len())
}

pub fn format_project_show_text(record: &ProjectRecord) -> String {
    let meta = &record.metadata;
    let mut out = format!("Project: {}\n", record.id);
    out.push_str(&format!("System: {} (v{})\n", meta.system.name, meta.system.version));
    out.push_str(&format!("Prompt: {}\n", meta.project_info.prompt));
    out.push_str(&format!("Request: {}\n", meta.project_info.request_id));
    out.push_str(&format!(
        "Created: {} ({:.2}s)\n",
        meta.project_info.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        meta.project_info.execution_time_seconds
    ));
    if let Some(sheet) = &meta.spreadsheet {
        out.push_str(&format!("Spreadsheet: {}\n", sheet.edit_url));
    }
    out.push_str(&format!(
        "Sheets: {}  Columns: {}  Formulas: {}  Rejected: {}\n",
        meta.system.total_sheets,
        meta.statistics.total_columns,
        meta.statistics.total_formulas,
        meta.statistics.rejected_formulas
    ));
    out.push_str(&format!("Directory: {}\n", record.dir.display()));
    out
}

pub fn format_failure_record_text(id: &str, record: &FailureRecord) -> String {
    let mut out = format!("Project: {} (failed)\n", id);
    out.push_str(&format!("Prompt: {}\n", record.prompt));
    out.push_str(&format!("Request: {}\n", record.request_id));
    out.push_str(&format!(
        "Failed during: {} [{}]\n",
        record.failed_stage, record.error_kind
    ));
    out.push_str(&format!("Error: {}\n", record.error));
    if let Some(sheet) = &record.spreadsheet {
        out.push_str(&format!("Partial spreadsheet: {}\n", sheet.edit_url));
    }
    out
}
