//! Spreadsheet Materializer: turns a validated structure and formula plan into a live workbook.
//!
//! This is the only step with an irreversible external effect. Nothing is rolled back on
//! failure; the error carries whatever spreadsheet id exists so the caller can clean up.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{BackendError, PipelineError};
use crate::pipeline::Stage;
use crate::schema::{FlowStructure, FormulaPlan};
use crate::sheets::a1::{column_range, header_range, FormulaTranslator};
use crate::sheets::backend::{SpreadsheetBackend, ValueInput};
use crate::sheets::SheetsConfig;
use crate::telemetry::{EventEmitter, EventLevel};

const SPREADSHEET_URL_BASE: &str = "https://docs.google.com/spreadsheets/d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetRef {
    pub id: String,
    pub url: String,
    pub edit_url: String,
}

impl SpreadsheetRef {
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("{}/{}", SPREADSHEET_URL_BASE, id);
        Self {
            edit_url: format!("{}/edit", url),
            url,
            id,
        }
    }
}

/// Per-sheet counts reported in the execution result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetStats {
    pub name: String,
    pub columns: usize,
    /// Rows written, header included.
    pub rows: u32,
    pub formulas: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializerSettings {
    pub grid_rows: u32,
    pub extra_columns: u32,
    pub fill_rows: u32,
    pub call_timeout: Duration,
}

impl Default for MaterializerSettings {
    fn default() -> Self {
        Self {
            grid_rows: 1000,
            extra_columns: 5,
            fill_rows: 100,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&SheetsConfig> for MaterializerSettings {
    fn from(config: &SheetsConfig) -> Self {
        Self {
            grid_rows: config.grid_rows,
            extra_columns: config.extra_columns,
            fill_rows: config.fill_rows,
            call_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub spreadsheet: SpreadsheetRef,
    pub sheet_stats: Vec<SheetStats>,
    /// Best-effort steps that failed without failing the run.
    pub warnings: Vec<String>,
}

pub struct Materializer {
    backend: Arc<dyn SpreadsheetBackend>,
    settings: MaterializerSettings,
}

impl Materializer {
    pub fn new(backend: Arc<dyn SpreadsheetBackend>, settings: MaterializerSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &MaterializerSettings {
        &self.settings
    }

    async fn call<T, F>(&self, op: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        match timeout(self.settings.call_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Transport(format!(
                "Spreadsheet backend call exceeded {}s",
                self.settings.call_timeout.as_secs()
            ))),
        }
    }

    pub async fn materialize(
        &self,
        structure: &FlowStructure,
        plan: &FormulaPlan,
        events: &EventEmitter,
    ) -> Result<Materialized, PipelineError> {
        let backend = self.backend.as_ref();

        self.call(backend.authenticate())
            .await
            .map_err(|e| match e {
                BackendError::Auth(msg) => PipelineError::Auth(msg),
                other => PipelineError::Transport(other.to_string()),
            })?;

        let handle = self
            .call(backend.create_spreadsheet(&structure.system_name))
            .await
            .map_err(|e| match e {
                BackendError::Auth(msg) => PipelineError::Auth(msg),
                other => PipelineError::Materialization {
                    message: format!("Failed to create spreadsheet: {}", other),
                    spreadsheet_id: None,
                },
            })?;
        let id = handle.spreadsheet_id.clone();
        let fail = |context: String, err: BackendError| PipelineError::Materialization {
            message: format!("{}: {}", context, err),
            spreadsheet_id: Some(id.clone()),
        };
        events.emit_with_data(
            Stage::Sheets,
            EventLevel::Info,
            format!("Created spreadsheet '{}'", structure.system_name),
            json!({ "spreadsheet_id": id }),
        );

        let mut warnings = Vec::new();

        // The default tab becomes the first sheet.
        let mut sheet_ids = Vec::with_capacity(structure.sheets.len());
        for (index, sheet) in structure.sheets.iter().enumerate() {
            let columns = sheet.columns.len() as u32 + self.settings.extra_columns;
            let sheet_id = match handle.default_sheet_id.filter(|_| index == 0) {
                Some(default_id) => {
                    self.call(backend.rename_sheet(
                        &id,
                        default_id,
                        &sheet.name,
                        self.settings.grid_rows,
                        columns,
                    ))
                    .await
                    .map_err(|e| fail(format!("Failed to prepare sheet '{}'", sheet.name), e))?;
                    default_id
                }
                None => self
                    .call(backend.add_sheet(&id, &sheet.name, self.settings.grid_rows, columns))
                    .await
                    .map_err(|e| fail(format!("Failed to add sheet '{}'", sheet.name), e))?,
            };
            sheet_ids.push(sheet_id);
        }

        for (sheet, sheet_id) in structure.sheets.iter().zip(&sheet_ids) {
            let headers: Vec<String> = sheet.columns.iter().map(|c| c.name.clone()).collect();
            self.call(backend.write_values(
                &id,
                &header_range(&sheet.name, headers.len()),
                vec![headers],
                ValueInput::Raw,
            ))
            .await
            .map_err(|e| fail(format!("Failed to write headers for '{}'", sheet.name), e))?;

            if let Err(e) = self
                .call(backend.format_header(&id, *sheet_id, sheet.columns.len() as u32))
                .await
            {
                warn!(spreadsheet_id = %id, sheet = %sheet.name, error = %e, "Header formatting failed");
                warnings.push(format!("Header formatting failed for '{}': {}", sheet.name, e));
            }
        }
        events.info(
            Stage::Sheets,
            format!("Created {} sheets with headers", structure.sheets.len()),
        );

        let mut sheet_stats: Vec<SheetStats> = structure
            .sheets
            .iter()
            .map(|s| SheetStats {
                name: s.name.clone(),
                columns: s.columns.len(),
                rows: 1,
                formulas: 0,
            })
            .collect();

        for (index, sheet) in structure.sheets.iter().enumerate() {
            let formulas: Vec<_> = plan.for_sheet(&sheet.name).collect();
            if formulas.is_empty() {
                continue;
            }
            let translator = FormulaTranslator::new(structure, sheet).map_err(|e| {
                PipelineError::Materialization {
                    message: format!("Cannot build formula translator for '{}': {}", sheet.name, e),
                    spreadsheet_id: Some(id.clone()),
                }
            })?;

            for formula in formulas {
                let Some(column_index) = sheet.column_index(&formula.column) else {
                    warn!(sheet = %sheet.name, column = %formula.column, "Formula target column missing");
                    continue;
                };
                let grid_rows = self.settings.grid_rows;
                if formula.start_row < 2 || formula.start_row > grid_rows {
                    warn!(
                        sheet = %sheet.name,
                        column = %formula.column,
                        start_row = formula.start_row,
                        grid_rows,
                        "Formula starts outside the grid"
                    );
                    warnings.push(format!(
                        "Formula for {}.{} skipped: start_row {} is outside rows 2..={}",
                        sheet.name, formula.column, formula.start_row, grid_rows
                    ));
                    continue;
                }
                let last_row = if formula.auto_fill {
                    formula
                        .start_row
                        .saturating_add(self.settings.fill_rows.max(1) - 1)
                        .min(grid_rows)
                } else {
                    formula.start_row
                };
                let values: Vec<Vec<String>> = (formula.start_row..=last_row)
                    .map(|row| vec![translator.translate(&formula.expression, row)])
                    .collect();
                let range = column_range(&sheet.name, column_index + 1, formula.start_row, last_row);
                debug!(range = %range, rows = values.len(), "Writing formula");

                self.call(backend.write_values(&id, &range, values, ValueInput::UserEntered))
                    .await
                    .map_err(|e| {
                        fail(
                            format!("Failed to write formula for {}.{}", sheet.name, formula.column),
                            e,
                        )
                    })?;

                let stats = &mut sheet_stats[index];
                stats.formulas += 1;
                stats.rows = stats.rows.max(last_row);
            }
        }
        if !plan.is_empty() {
            events.info(
                Stage::Sheets,
                format!("Applied {} formulas", plan.formulas.len()),
            );
        }

        Ok(Materialized {
            spreadsheet: SpreadsheetRef::from_id(id.clone()),
            sheet_stats,
            warnings,
        })
    }
}
