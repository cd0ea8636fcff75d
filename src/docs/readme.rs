//! Deterministic README rendering. Output depends only on the `ExecutionResult`.

use std::fmt::Write;

use crate::pipeline::ExecutionResult;
use crate::schema::{FlowStructure, SheetSpec};

pub fn render_readme(result: &ExecutionResult) -> String {
    let mut out = String::new();
    let structure = &result.structure;

    let _ = writeln!(out, "# {}\n", structure.system_name);
    if !structure.description.is_empty() {
        let _ = writeln!(out, "{}\n", structure.description);
    }

    overview(&mut out, result);
    workflow_stages(&mut out, structure);
    sheets(&mut out, structure);
    formulas(&mut out, result);
    integrations(&mut out, structure);
    file_tree(&mut out);
    relationship_diagram(&mut out, structure);

    out
}

/// Inline code whose fence is longer than any backtick run in `text`, so nothing is rewritten.
fn code_span(text: &str) -> String {
    let longest_run = text
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run + 1);
    let pad = if text.starts_with('`') || text.ends_with('`') {
        " "
    } else {
        ""
    };
    format!("{fence}{pad}{text}{pad}{fence}")
}

fn cell(text: &str) -> String {
    let text = text.replace('|', "\\|").replace('\n', " ");
    if text.trim().is_empty() {
        "-".to_string()
    } else {
        text
    }
}

fn overview(out: &mut String, result: &ExecutionResult) {
    let _ = writeln!(out, "## Overview\n");
    let _ = writeln!(out, "- **Requirement:** {}", result.prompt.trim());
    let _ = writeln!(out, "- **Version:** {}", result.structure.version);
    let _ = writeln!(out, "- **Request ID:** `{}`", result.request_id);
    let _ = writeln!(
        out,
        "- **Generated:** {}",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "- **Generation time:** {:.2}s", result.elapsed_seconds());
    let _ = writeln!(
        out,
        "- **Sheets:** {} | **Columns:** {} | **Formulas:** {}\n",
        result.structure.sheets.len(),
        result.structure.total_columns(),
        result.total_formulas()
    );

    let _ = writeln!(out, "## Quick Links\n");
    match &result.spreadsheet {
        Some(sheet) => {
            let _ = writeln!(out, "- [Open spreadsheet]({})", sheet.url);
            let _ = writeln!(out, "- [Edit spreadsheet]({})", sheet.edit_url);
        }
        None => {
            let _ = writeln!(out, "- Spreadsheet not created");
        }
    }
    let _ = writeln!(out, "- [Structure](schemas/flow_structure.json)");
    let _ = writeln!(out, "- [Formula plan](schemas/formula_plan.json)");
    let _ = writeln!(out, "- [Metadata](metadata.json)\n");
}

fn workflow_stages(out: &mut String, structure: &FlowStructure) {
    if structure.workflow_stages.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Workflow\n");
    let chain = structure
        .workflow_stages
        .iter()
        .enumerate()
        .map(|(i, stage)| format!("**{}. {}**", i + 1, stage))
        .collect::<Vec<_>>()
        .join(" → ");
    let _ = writeln!(out, "{}\n", chain);
}

fn sheets(out: &mut String, structure: &FlowStructure) {
    let _ = writeln!(out, "## Sheets\n");
    for sheet in &structure.sheets {
        sheet_table(out, sheet);
    }
}

fn sheet_table(out: &mut String, sheet: &SheetSpec) {
    let _ = writeln!(out, "### {}\n", sheet.name);
    if !sheet.description.is_empty() {
        let _ = writeln!(out, "{}\n", sheet.description);
    }
    let _ = writeln!(out, "| Column | Type | Required | Default | Description |");
    let _ = writeln!(out, "|---|---|---|---|---|");
    for column in &sheet.columns {
        let mut description = column.description.clone();
        if let Some(validation) = &column.validation {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(&format!("(validation: {})", validation));
        }
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            cell(&column.name),
            column.column_type,
            if column.required { "yes" } else { "no" },
            cell(column.default_value.as_deref().unwrap_or("")),
            cell(&description)
        );
    }
    let _ = writeln!(out);
    if let Some(pk) = &sheet.primary_key {
        let _ = writeln!(out, "- **Primary key:** `{}`", pk);
    }
    if !sheet.relationships.is_empty() {
        let _ = writeln!(out, "- **Related to:** {}", sheet.relationships.join(", "));
    }
    if sheet.primary_key.is_some() || !sheet.relationships.is_empty() {
        let _ = writeln!(out);
    }
}

fn formulas(out: &mut String, result: &ExecutionResult) {
    let _ = writeln!(out, "## Formulas\n");
    if result.formula_plan.is_empty() {
        let _ = writeln!(out, "No formulas were generated.\n");
    } else {
        let _ = writeln!(out, "| Sheet | Column | Expression | Dependencies | Auto-fill |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        for f in &result.formula_plan.formulas {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                cell(&f.sheet),
                cell(&f.column),
                code_span(&f.expression.replace('|', "\\|")),
                cell(&f.dependencies.join(", ")),
                if f.auto_fill {
                    format!("from row {}", f.start_row)
                } else {
                    format!("row {} only", f.start_row)
                }
            );
        }
        let _ = writeln!(out);
        let described: Vec<_> = result
            .formula_plan
            .formulas
            .iter()
            .filter(|f| !f.rationale.is_empty())
            .collect();
        for f in &described {
            let _ = writeln!(out, "- **{}.{}**: {}", f.sheet, f.column, f.rationale);
        }
        if !described.is_empty() {
            let _ = writeln!(out);
        }
    }
    if !result.rejected_formulas.is_empty() {
        let _ = writeln!(
            out,
            "{} formula candidate(s) were discarded:\n",
            result.rejected_formulas.len()
        );
        for r in &result.rejected_formulas {
            let _ = writeln!(out, "- {}.{}: {}", r.sheet, r.column, r.reason);
        }
        let _ = writeln!(out);
    }
}

fn integrations(out: &mut String, structure: &FlowStructure) {
    if structure.integrations.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Integrations\n");
    for integration in &structure.integrations {
        let _ = writeln!(out, "- {}", integration);
    }
    let _ = writeln!(out);
}

fn file_tree(out: &mut String) {
    let _ = writeln!(out, "## Project Files\n");
    let _ = writeln!(out, "```text");
    let _ = writeln!(out, ".");
    let _ = writeln!(out, "├── README.md");
    let _ = writeln!(out, "├── metadata.json");
    let _ = writeln!(out, "└── schemas/");
    let _ = writeln!(out, "    ├── complete_schema.json");
    let _ = writeln!(out, "    ├── flow_structure.json");
    let _ = writeln!(out, "    └── formula_plan.json");
    let _ = writeln!(out, "```\n");
}

fn relationship_diagram(out: &mut String, structure: &FlowStructure) {
    let _ = writeln!(out, "## Relationships\n");
    let _ = writeln!(out, "```mermaid");
    let _ = writeln!(out, "graph LR");
    for (i, sheet) in structure.sheets.iter().enumerate() {
        let _ = writeln!(out, "    S{}[\"{}\"]", i, sheet.name.replace('"', "'"));
    }
    for (i, sheet) in structure.sheets.iter().enumerate() {
        for target in &sheet.relationships {
            if let Some(j) = structure.sheets.iter().position(|s| &s.name == target) {
                let _ = writeln!(out, "    S{} --> S{}", i, j);
            }
        }
    }
    let _ = writeln!(out, "```");
}
