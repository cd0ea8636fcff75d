//! Validated workflow data model.
//!
//! Values of these types are only produced by the validator (or deserialized from artifacts the
//! pipeline itself wrote), so downstream code can rely on their invariants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of column types a generated sheet may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Currency,
    Date,
    Email,
    Dropdown,
    Checkbox,
}

impl ColumnType {
    pub const ALL: [ColumnType; 7] = [
        ColumnType::Text,
        ColumnType::Number,
        ColumnType::Currency,
        ColumnType::Date,
        ColumnType::Email,
        ColumnType::Dropdown,
        ColumnType::Checkbox,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Currency => "currency",
            ColumnType::Date => "date",
            ColumnType::Email => "email",
            ColumnType::Dropdown => "dropdown",
            ColumnType::Checkbox => "checkbox",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ColumnType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub columns: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
}

impl SheetSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Zero-based position of a column in header order.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStructure {
    pub system_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub workflow_stages: Vec<String>,
    #[serde(default)]
    pub integrations: Vec<String>,
    pub sheets: Vec<SheetSpec>,
}

pub(crate) fn default_version() -> String {
    "1.0".to_string()
}

impl FlowStructure {
    pub fn sheet(&self, name: &str) -> Option<&SheetSpec> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn total_columns(&self) -> usize {
        self.sheets.iter().map(|s| s.columns.len()).sum()
    }
}

/// One formula bound to a sheet column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaDefinition {
    pub sheet: String,
    pub column: String,
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    pub expression: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_auto_fill")]
    pub auto_fill: bool,
}

pub(crate) fn default_start_row() -> u32 {
    2
}

pub(crate) fn default_auto_fill() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaPlan {
    #[serde(default)]
    pub formulas: Vec<FormulaDefinition>,
}

impl FormulaPlan {
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    pub fn for_sheet<'a>(&'a self, sheet: &'a str) -> impl Iterator<Item = &'a FormulaDefinition> {
        self.formulas.iter().filter(move |f| f.sheet == sheet)
    }
}

/// A formula candidate the generator discarded, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedFormula {
    pub sheet: String,
    pub column: String,
    pub reason: String,
}
