//! CLI output: error mapping from domain errors to stable CLI surface.

use thiserror::Error;

use crate::error::{ErrorKind, PipelineError};
use crate::pipeline::WorkflowFailure;

/// Anything a command can fail with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Workflow(#[from] WorkflowFailure),
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Pipeline(e) => e.kind(),
            CommandError::Workflow(f) => f.error.kind(),
        }
    }
}

/// Map command errors to a string for CLI output.
pub fn map_error(e: &CommandError) -> String {
    match e {
        CommandError::Pipeline(err) => format!("error[{}]: {}", err.kind().as_str(), err),
        CommandError::Workflow(failure) => {
            let mut out = format!(
                "error[{}]: {} failed during {}: {}",
                failure.error.kind().as_str(),
                failure.request_id,
                failure.failed_stage,
                failure.error
            );
            if let Some(spreadsheet) = &failure.spreadsheet {
                out.push_str(&format!("\nspreadsheet left behind: {}", spreadsheet.url));
            }
            if let Some(path) = &failure.failure_record {
                out.push_str(&format!("\nfailure record: {}", path.display()));
            }
            out
        }
    }
}

/// Process exit status per error kind.
pub fn exit_code(e: &CommandError) -> i32 {
    match e.kind() {
        ErrorKind::Config => 2,
        ErrorKind::Auth => 3,
        ErrorKind::Cancelled => 130,
        _ => 1,
    }
}
