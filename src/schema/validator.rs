//! Schema validator: the strict boundary between decoded model output and the trusted model.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{PipelineError, SchemaError};
use crate::schema::raw::{RawColumn, RawFlowStructure, RawSheet};
use crate::schema::types::{default_version, ColumnSpec, ColumnType, FlowStructure, SheetSpec};

const MAX_SHEET_NAME_LEN: usize = 100;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', '*', '?', ':', '/', '\\'];

/// Decode a JSON value into the raw shape, then validate it.
///
/// A value that does not have the expected shape is a generation error; a well-shaped value
/// that breaks an invariant is a schema error.
pub fn validate_value(value: Value) -> Result<FlowStructure, PipelineError> {
    let raw: RawFlowStructure = serde_json::from_value(value).map_err(|e| {
        PipelineError::Generation(format!("Response does not match structure shape: {}", e))
    })?;
    Ok(validate_structure(raw)?)
}

/// Validate a raw structure. Returns the first violation found.
pub fn validate_structure(raw: RawFlowStructure) -> Result<FlowStructure, SchemaError> {
    let system_name = raw.system_name.trim().to_string();
    if system_name.is_empty() {
        return Err(SchemaError::EmptySystemName);
    }
    if raw.sheets.is_empty() {
        return Err(SchemaError::NoSheets);
    }

    let mut seen = HashSet::new();
    let mut sheets = Vec::with_capacity(raw.sheets.len());
    for (index, raw_sheet) in raw.sheets.into_iter().enumerate() {
        let sheet = validate_sheet(index, raw_sheet)?;
        if !seen.insert(sheet.name.to_lowercase()) {
            return Err(SchemaError::DuplicateSheet { sheet: sheet.name });
        }
        sheets.push(sheet);
    }

    for sheet in &sheets {
        for target in &sheet.relationships {
            if !sheets.iter().any(|s| &s.name == target) {
                return Err(SchemaError::UnknownRelationship {
                    sheet: sheet.name.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    Ok(FlowStructure {
        system_name,
        description: raw.description.unwrap_or_default().trim().to_string(),
        version: raw
            .version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_version),
        workflow_stages: raw.workflow_stages,
        integrations: raw.integrations,
        sheets,
    })
}

fn validate_sheet(index: usize, raw: RawSheet) -> Result<SheetSpec, SchemaError> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err(SchemaError::EmptySheetName { index });
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(SchemaError::InvalidSheetName {
            sheet: name,
            reason: format!("longer than {} characters", MAX_SHEET_NAME_LEN),
        });
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
        return Err(SchemaError::InvalidSheetName {
            sheet: name,
            reason: format!("contains forbidden character '{}'", c),
        });
    }
    if raw.columns.is_empty() {
        return Err(SchemaError::NoColumns { sheet: name });
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(raw.columns.len());
    for (col_index, raw_column) in raw.columns.into_iter().enumerate() {
        let column = validate_column(&name, col_index, raw_column)?;
        if !seen.insert(column.name.clone()) {
            return Err(SchemaError::DuplicateColumn {
                sheet: name,
                column: column.name,
            });
        }
        columns.push(column);
    }

    let primary_key = raw
        .primary_key
        .map(|pk| pk.trim().to_string())
        .filter(|pk| !pk.is_empty());
    if let Some(pk) = &primary_key {
        if !columns.iter().any(|c| &c.name == pk) {
            return Err(SchemaError::UnknownPrimaryKey {
                sheet: name,
                primary_key: pk.clone(),
            });
        }
    }

    Ok(SheetSpec {
        name,
        description: raw.description.unwrap_or_default().trim().to_string(),
        columns,
        primary_key,
        relationships: raw
            .relationships
            .into_iter()
            .map(|r| r.trim().to_string())
            .collect(),
    })
}

fn validate_column(sheet: &str, index: usize, raw: RawColumn) -> Result<ColumnSpec, SchemaError> {
    let detail = match raw {
        RawColumn::Name(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(SchemaError::EmptyColumnName {
                    sheet: sheet.to_string(),
                    index,
                });
            }
            return Ok(ColumnSpec {
                name,
                column_type: ColumnType::Text,
                required: false,
                default_value: None,
                validation: None,
                description: String::new(),
            });
        }
        RawColumn::Detailed(detail) => detail,
    };

    let name = detail.name.trim().to_string();
    if name.is_empty() {
        return Err(SchemaError::EmptyColumnName {
            sheet: sheet.to_string(),
            index,
        });
    }

    let column_type = match detail.column_type.as_deref().map(str::trim) {
        None | Some("") => ColumnType::Text,
        Some(declared) => {
            declared
                .parse::<ColumnType>()
                .map_err(|found| SchemaError::UnknownColumnType {
                    sheet: sheet.to_string(),
                    column: name.clone(),
                    column_type: found,
                })?
        }
    };

    let default_value = normalize_default(sheet, &name, detail.default_value)?;

    Ok(ColumnSpec {
        name,
        column_type,
        required: detail.required,
        default_value,
        validation: detail.validation.filter(|v| !v.trim().is_empty()),
        description: detail.description.unwrap_or_default().trim().to_string(),
    })
}

/// Coerce a primitive default to its textual form.
fn normalize_default(
    sheet: &str,
    column: &str,
    value: Option<Value>,
) -> Result<Option<String>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(SchemaError::InvalidDefaultValue {
            sheet: sheet.to_string(),
            column: column.to_string(),
            found: if other.is_array() { "array" } else { "object" }.to_string(),
        }),
    }
}
