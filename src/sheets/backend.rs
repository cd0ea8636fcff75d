//! Spreadsheet backend seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A freshly created spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetHandle {
    pub spreadsheet_id: String,
    /// Tab the backend creates automatically, if any.
    pub default_sheet_id: Option<i64>,
}

/// How the backend interprets written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// Stored verbatim.
    Raw,
    /// Parsed as if typed by a user, so `=` starts a formula.
    UserEntered,
}

impl ValueInput {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueInput::Raw => "RAW",
            ValueInput::UserEntered => "USER_ENTERED",
        }
    }
}

#[async_trait]
pub trait SpreadsheetBackend: Send + Sync {
    /// Confirm a usable credential exists. Nothing is created.
    async fn authenticate(&self) -> Result<(), BackendError>;

    async fn create_spreadsheet(&self, title: &str) -> Result<SpreadsheetHandle, BackendError>;

    /// Add a tab and return its sheet id.
    async fn add_sheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<i64, BackendError>;

    /// Retitle and resize an existing tab.
    async fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<(), BackendError>;

    /// Write a block of rows starting at the top-left of `range`.
    async fn write_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
        input: ValueInput,
    ) -> Result<(), BackendError>;

    /// Style the header row, freeze it, and size the columns.
    async fn format_header(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        column_count: u32,
    ) -> Result<(), BackendError>;

    fn backend_name(&self) -> &str;
}
