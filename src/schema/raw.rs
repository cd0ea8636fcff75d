//! Loosely-typed intermediates decoded straight from model output.
//!
//! These accept what a model actually emits (missing fields, numeric defaults, bare column-name
//! strings, alternate field names) and are never trusted until the validator has run.

use serde::Deserialize;
use serde_json::Value;

use crate::schema::types::{default_auto_fill, default_start_row};

#[derive(Debug, Clone, Deserialize)]
pub struct RawFlowStructure {
    #[serde(default)]
    pub system_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub workflow_stages: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub integrations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sheets: Vec<RawSheet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSheet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<RawColumn>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relationships: Vec<String>,
}

/// A column as emitted by the model: either a full object or just its name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawColumn {
    Name(String),
    Detailed(RawColumnDetail),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawColumnDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub column_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required: bool,
    #[serde(default)]
    pub validation: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl RawColumn {
    pub fn name(&self) -> &str {
        match self {
            RawColumn::Name(name) => name,
            RawColumn::Detailed(detail) => &detail.name,
        }
    }
}

/// One formula candidate. Field aliases cover the names older prompts asked for.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFormula {
    pub sheet: String,
    #[serde(alias = "target_column")]
    pub column: String,
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    #[serde(alias = "formula")]
    pub expression: String,
    #[serde(default, alias = "description")]
    pub rationale: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,
    #[serde(default = "default_auto_fill", alias = "apply_to_all_rows")]
    pub auto_fill: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
