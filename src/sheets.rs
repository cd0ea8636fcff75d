//! Spreadsheet domain: A1 helpers, the backend seam, the Google Sheets implementation,
//! credential resolution, and the materializer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub mod a1;
pub mod backend;
pub mod credential;
pub mod google;
pub mod materializer;

pub use backend::{SpreadsheetBackend, SpreadsheetHandle, ValueInput};
pub use credential::CredentialResolver;
pub use google::GoogleSheetsBackend;
pub use materializer::{
    Materialized, Materializer, MaterializerSettings, SheetStats, SpreadsheetRef,
};

/// `[sheets]` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Bearer token; usually supplied as FLOWSHEET_SHEETS__ACCESS_TOKEN.
    #[serde(default)]
    pub access_token: Option<String>,

    /// JSON file written by an external OAuth flow.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    #[serde(default)]
    pub api_base: Option<String>,

    #[serde(default = "default_grid_rows")]
    pub grid_rows: u32,

    #[serde(default = "default_extra_columns")]
    pub extra_columns: u32,

    /// Rows an auto-fill formula is written to.
    #[serde(default = "default_fill_rows")]
    pub fill_rows: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_grid_rows() -> u32 {
    1000
}

fn default_extra_columns() -> u32 {
    5
}

fn default_fill_rows() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            token_file: None,
            api_base: None,
            grid_rows: default_grid_rows(),
            extra_columns: default_extra_columns(),
            fill_rows: default_fill_rows(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SheetsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_rows < 2 {
            return Err("grid_rows must be at least 2".to_string());
        }
        if self.fill_rows == 0 {
            return Err("fill_rows must be greater than zero".to_string());
        }
        if self.fill_rows >= self.grid_rows {
            return Err(format!(
                "fill_rows ({}) must be smaller than grid_rows ({})",
                self.fill_rows, self.grid_rows
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn credentials(&self) -> CredentialResolver {
        CredentialResolver::new(self.access_token.clone(), self.token_file.clone())
    }

    pub fn build_backend(&self) -> Result<Arc<dyn SpreadsheetBackend>, BackendError> {
        Ok(Arc::new(GoogleSheetsBackend::new(
            self.credentials(),
            self.api_base.as_deref(),
            Duration::from_secs(self.request_timeout_secs),
        )?))
    }
}
