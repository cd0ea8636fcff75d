//! Fixed instruction templates for the two generation calls.

use std::fmt::Write;

use crate::schema::{ColumnType, FlowStructure};

pub const STRUCTURE_SYSTEM_PROMPT: &str = "\
You are a business workflow architect who designs spreadsheet-backed operational systems.

Design principles:
1. Normalization: one sheet per business entity or event log; never repeat the same facts in two sheets.
2. Identity: every sheet has a primary key column (for example `order_id`) listed in `primary_key`.
3. Audit fields: include `created_at`, `updated_at` or `status` columns wherever records change over time.
4. Workflow awareness: list the business stages in order in `workflow_stages`, and give records that move \
through them a `status` column of type dropdown.
5. Relationship integrity: a sheet that references another sheet carries that sheet's key column and names \
it in `relationships`.

Column names are snake_case. Every column type MUST be one of: {types}.
Quantities, counts and scores are `number`; money is `currency`.

Respond with a single JSON object and nothing else.";

pub const FORMULA_SYSTEM_PROMPT: &str = "\
You are a spreadsheet formula architect for Google Sheets.

Rules:
1. Only target columns that ALREADY EXIST in the structure you are given. Never invent columns.
2. Reference columns by their exact column name; they are translated to cell references later.
   Use `Sheet.column` to reference a column of another sheet.
3. Allowed formula categories: arithmetic, conditional logic (IF, IFS), text (CONCATENATE, TEXT), \
date (TODAY, DATEDIF, EDATE) and lookups (VLOOKUP, XLOOKUP, INDEX/MATCH).
4. Wrap every formula that can fail in IFERROR(..., \"\").
5. Every expression starts with `=`. List every column the expression reads in `dependencies`.
6. `auto_fill: true` fills the formula down every data row starting at `start_row` (at least 2, \
row 1 is the header).

If no formulas are useful, return {\"formulas\": []}.
Respond with a single JSON object and nothing else.";

const STRUCTURE_SHAPE: &str = r#"{
  "system_name": "",
  "description": "",
  "version": "1.0",
  "workflow_stages": [""],
  "integrations": [""],
  "sheets": [
    {
      "name": "",
      "description": "",
      "primary_key": "",
      "relationships": [""],
      "columns": [
        {"name": "", "type": "text", "required": true, "default_value": null, "validation": "", "description": ""}
      ]
    }
  ]
}"#;

const FORMULA_SHAPE: &str = r#"{
  "formulas": [
    {
      "sheet": "",
      "column": "",
      "start_row": 2,
      "expression": "=",
      "rationale": "",
      "dependencies": [""],
      "auto_fill": true
    }
  ]
}"#;

pub fn structure_system_prompt() -> String {
    let types = ColumnType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    STRUCTURE_SYSTEM_PROMPT.replace("{types}", &types)
}

pub fn structure_user_message(prompt: &str) -> String {
    format!(
        "Design the spreadsheet system for this requirement:\n{}\n\nReturn ONLY valid JSON with exactly this shape:\n{}",
        prompt.trim(),
        STRUCTURE_SHAPE
    )
}

/// Serialized structure listing each sheet with its key and typed columns.
pub fn describe_structure(structure: &FlowStructure) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "System: {}", structure.system_name);
    if !structure.description.is_empty() {
        let _ = writeln!(out, "Description: {}", structure.description);
    }
    for sheet in &structure.sheets {
        let _ = writeln!(out);
        let _ = writeln!(out, "Sheet \"{}\"", sheet.name);
        if !sheet.description.is_empty() {
            let _ = writeln!(out, "  Description: {}", sheet.description);
        }
        if let Some(pk) = &sheet.primary_key {
            let _ = writeln!(out, "  Primary key: {}", pk);
        }
        if !sheet.relationships.is_empty() {
            let _ = writeln!(out, "  References: {}", sheet.relationships.join(", "));
        }
        let _ = writeln!(out, "  Columns:");
        for column in &sheet.columns {
            let _ = writeln!(out, "    - {} ({})", column.name, column.column_type);
        }
    }
    out
}

pub fn formula_user_message(structure: &FlowStructure) -> String {
    format!(
        "Given this structure:\n{}\nReturn ONLY valid JSON with exactly this shape:\n{}",
        describe_structure(structure),
        FORMULA_SHAPE
    )
}
