//! Configuration System
//!
//! Layered configuration: merge-policy defaults, the global file, workspace files, then
//! `FLOWSHEET_*` environment variables. Validation collects every problem instead of stopping
//! at the first.

use crate::error::PipelineError;
use crate::generation::RetryPolicy;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};
pub use crate::sheets::SheetsConfig;

mod merge;
mod sources;

pub use sources::environment::{ENV_PREFIX, ENV_SEPARATOR};
pub use sources::global_file::global_config_path;
pub use sources::workspace_file::workspace_config_path;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowsheetConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[pipeline]` retry and timeout settings for completion calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// `[storage]` paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of persisted project directories. Relative paths resolve against the workspace.
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from("projects")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Sheets(String),
    Pipeline(String),
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "provider: {}", msg),
            ValidationError::Sheets(msg) => write!(f, "sheets: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "pipeline: {}", msg),
            ValidationError::Storage(msg) => write!(f, "storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FlowsheetConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.sheets.validate() {
            errors.push(ValidationError::Sheets(e));
        }
        if let Err(e) = self.pipeline.validate() {
            errors.push(ValidationError::Pipeline(e));
        }
        if self.storage.projects_dir.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "projects_dir cannot be empty".to_string(),
            ));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one `PipelineError::Config`.
    pub fn ensure_valid(&self) -> Result<(), PipelineError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PipelineError::Config(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }

    /// Anchor a relative projects_dir at the workspace root.
    pub fn resolve_paths(&mut self, workspace_root: &Path) {
        if self.storage.projects_dir.is_relative() {
            self.storage.projects_dir = workspace_root.join(&self.storage.projects_dir);
        }
        if self.logging.file.is_relative() {
            self.logging.file = workspace_root.join(&self.logging.file);
        }
    }
}

/// Builds a `FlowsheetConfig` from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then workspace files, then the environment.
    pub fn load(workspace_root: &Path) -> Result<FlowsheetConfig, PipelineError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);
        let config: FlowsheetConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Defaults, then `path`, then the environment. File layers are skipped.
    pub fn load_from_file(path: &Path) -> Result<FlowsheetConfig, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path.to_path_buf()).required(true));
        let builder = sources::environment::add_to_builder(builder);
        let config: FlowsheetConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn xdg_config_path() -> Option<PathBuf> {
        global_config_path()
    }
}
