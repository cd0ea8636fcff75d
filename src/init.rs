//! `flowsheet init`: write a default `config/config.toml` into the workspace.

use std::path::{Path, PathBuf};

use crate::config::{workspace_config_path, FlowsheetConfig};
use crate::error::PipelineError;

const HEADER: &str = "\
# flowsheet configuration
#
# Every key may be overridden with FLOWSHEET_<SECTION>__<KEY>, for example
# FLOWSHEET_PROVIDER__MODEL=gpt-4o-mini or FLOWSHEET_SHEETS__ACCESS_TOKEN=ya29...
#
# provider.api_key falls back to OPENAI_API_KEY, ANTHROPIC_API_KEY or GROQ_API_KEY.
# The spreadsheet credential falls back to sheets.token_file, then GOOGLE_OAUTH_ACCESS_TOKEN.

";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitResult {
    pub path: PathBuf,
    /// False when the file already existed and `force` was not set.
    pub created: bool,
}

/// Render the default configuration as commented TOML.
pub fn default_config_toml() -> Result<String, PipelineError> {
    let body = toml::to_string_pretty(&FlowsheetConfig::default())
        .map_err(|e| PipelineError::Config(format!("Failed to render default config: {}", e)))?;
    Ok(format!("{}{}", HEADER, body))
}

pub fn initialize_config(workspace_root: &Path, force: bool) -> Result<InitResult, PipelineError> {
    let path = workspace_config_path(workspace_root);
    if path.exists() && !force {
        return Ok(InitResult {
            path,
            created: false,
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, default_config_toml()?)?;
    Ok(InitResult {
        path,
        created: true,
    })
}
