//! Error types for the workflow generation pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural or referential violation found by the schema validator.
///
/// Only the first violation is reported; the validator never repairs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("System name cannot be empty")]
    EmptySystemName,

    #[error("Structure must contain at least one sheet")]
    NoSheets,

    #[error("Sheet #{index} has an empty name")]
    EmptySheetName { index: usize },

    #[error("Sheet name '{sheet}' is invalid: {reason}")]
    InvalidSheetName { sheet: String, reason: String },

    #[error("Duplicate sheet name: '{sheet}'")]
    DuplicateSheet { sheet: String },

    #[error("Sheet '{sheet}' has no columns")]
    NoColumns { sheet: String },

    #[error("Sheet '{sheet}' has a column with an empty name at position {index}")]
    EmptyColumnName { sheet: String, index: usize },

    #[error("Duplicate column '{column}' in sheet '{sheet}'")]
    DuplicateColumn { sheet: String, column: String },

    #[error("Unknown column type '{column_type}' for column '{column}' in sheet '{sheet}'")]
    UnknownColumnType {
        sheet: String,
        column: String,
        column_type: String,
    },

    #[error("Default value for column '{column}' in sheet '{sheet}' must be a primitive, got {found}")]
    InvalidDefaultValue {
        sheet: String,
        column: String,
        found: String,
    },

    #[error("Primary key '{primary_key}' of sheet '{sheet}' is not a column of that sheet")]
    UnknownPrimaryKey { sheet: String, primary_key: String },

    #[error("Sheet '{sheet}' references unknown sheet '{target}'")]
    UnknownRelationship { sheet: String, target: String },
}

/// Completion endpoint failures.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Provider model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider request timed out: {0}")]
    Timeout(String),

    #[error("Provider connection error: {0}")]
    Connect(String),

    #[error("Provider request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether resubmitting the identical request can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited(_)
            | ProviderError::Timeout(_)
            | ProviderError::Connect(_) => true,
            ProviderError::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Spreadsheet backend failures.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Spreadsheet backend authentication failed: {0}")]
    Auth(String),

    #[error("Spreadsheet backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Spreadsheet backend transport error: {0}")]
    Transport(String),
}

/// Stable error category carried by terminal pipeline events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Generation,
    Schema,
    Materialization,
    Auth,
    Cancelled,
    Config,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Generation => "generation",
            ErrorKind::Schema => "schema",
            ErrorKind::Materialization => "materialization",
            ErrorKind::Auth => "auth",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Pipeline-level error taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Materialization error: {message}")]
    Materialization {
        message: String,
        spreadsheet_id: Option<String>,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Workflow cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage I/O error: {0}")]
    Storage(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Transport(_) => ErrorKind::Transport,
            PipelineError::Generation(_) => ErrorKind::Generation,
            PipelineError::Schema(_) => ErrorKind::Schema,
            PipelineError::Materialization { .. } => ErrorKind::Materialization,
            PipelineError::Auth(_) => ErrorKind::Auth,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Identifier of a partially created spreadsheet, if any.
    pub fn partial_spreadsheet_id(&self) -> Option<&str> {
        match self {
            PipelineError::Materialization { spreadsheet_id, .. } => spreadsheet_id.as_deref(),
            _ => None,
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Auth(msg) => PipelineError::Auth(msg),
            ProviderError::InvalidResponse(msg) => PipelineError::Generation(msg),
            other => PipelineError::Transport(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Storage(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}
