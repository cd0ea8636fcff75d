//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cli::output::CommandError;
use crate::cli::parse::{Commands, ProjectCommands};
use crate::cli::presentation::{
    format_batch_text, format_event_line, format_execution_text, format_failure_record_text,
    format_init_result, format_plan_text, format_project_list_text, format_project_show_text,
    format_validation_text, to_pretty_json, BatchEntry,
};
use crate::config::{ConfigLoader, FlowsheetConfig};
use crate::docs::ProjectStore;
use crate::error::PipelineError;
use crate::init::initialize_config;
use crate::pipeline::{CancelSignal, WorkflowPipeline};
use crate::schema::validate_value;
use crate::telemetry::{new_request_id, EventBus, EventSubscriber};

/// Runtime context for CLI execution: workspace, resolved config, and output preferences.
pub struct RunContext {
    workspace_root: PathBuf,
    config: FlowsheetConfig,
    /// Stream pipeline events to stderr.
    live_events: bool,
}

impl RunContext {
    /// Load and validate configuration. Uses ConfigLoader only.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        live_events: bool,
    ) -> Result<Self, PipelineError> {
        let mut config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.resolve_paths(&workspace_root);
        config.ensure_valid()?;
        Ok(Self {
            workspace_root,
            config,
            live_events,
        })
    }

    pub fn config(&self) -> &FlowsheetConfig {
        &self.config
    }

    fn projects(&self) -> ProjectStore {
        ProjectStore::new(self.config.storage.projects_dir.clone())
    }

    fn pipeline(&self) -> Result<Arc<WorkflowPipeline>, PipelineError> {
        Ok(Arc::new(WorkflowPipeline::from_config(
            &self.config,
            EventBus::default(),
        )?))
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, CommandError> {
        match command {
            Commands::Create { prompt, format } => self.create(prompt, format).await,
            Commands::Plan { prompt, format } => self.plan(prompt, format).await,
            Commands::Batch { prompts, format } => self.batch(prompts, format).await,
            Commands::Validate { file, format } => Ok(self.validate(file, format)?),
            Commands::Projects { command } => Ok(self.handle_projects_command(command)?),
            Commands::Init { force } => {
                let result = initialize_config(&self.workspace_root, *force)?;
                Ok(format_init_result(&result))
            }
        }
    }

    async fn create(&self, prompt: &str, format: &str) -> Result<String, CommandError> {
        let pipeline = self.pipeline()?;
        let request_id = new_request_id();
        let printer = self.spawn_event_printer(pipeline.events(), &request_id);
        let cancel = CancelSignal::new();
        let interrupt = spawn_interrupt_watcher(cancel.clone());

        let outcome = pipeline.run_with_id(request_id, prompt, &cancel).await;
        interrupt.abort();
        finish_printer(printer).await;

        let result = outcome?;
        if format == "json" {
            Ok(to_pretty_json(&result)?)
        } else {
            Ok(format_execution_text(&result))
        }
    }

    async fn plan(&self, prompt: &str, format: &str) -> Result<String, CommandError> {
        let pipeline = self.pipeline()?;
        let cancel = CancelSignal::new();
        let interrupt = spawn_interrupt_watcher(cancel.clone());
        let outcome = pipeline.plan(prompt, &cancel).await;
        interrupt.abort();

        let plan = outcome?;
        if format == "json" {
            Ok(to_pretty_json(&plan)?)
        } else {
            Ok(format_plan_text(&plan))
        }
    }

    async fn batch(&self, prompts: &[String], format: &str) -> Result<String, CommandError> {
        let pipeline = self.pipeline()?;
        let cancel = CancelSignal::new();
        let interrupt = spawn_interrupt_watcher(cancel.clone());
        info!(count = prompts.len(), "Starting batch");

        let runs = prompts.iter().map(|prompt| {
            let pipeline = Arc::clone(&pipeline);
            let cancel = cancel.clone();
            let request_id = new_request_id();
            let printer = self.spawn_event_printer(pipeline.events(), &request_id);
            async move {
                let outcome = pipeline.run_with_id(request_id.clone(), prompt, &cancel).await;
                finish_printer(printer).await;
                match outcome {
                    Ok(result) => BatchEntry {
                        prompt: prompt.clone(),
                        request_id,
                        ok: true,
                        detail: result
                            .spreadsheet
                            .map(|s| s.edit_url)
                            .unwrap_or_else(|| "-".to_string()),
                    },
                    Err(failure) => BatchEntry {
                        prompt: prompt.clone(),
                        request_id,
                        ok: false,
                        detail: format!("{}: {}", failure.failed_stage, failure.error),
                    },
                }
            }
        });
        let entries = join_all(runs).await;
        interrupt.abort();

        if format == "json" {
            Ok(to_pretty_json(&entries)?)
        } else {
            Ok(format_batch_text(&entries))
        }
    }

    fn validate(&self, file: &Path, format: &str) -> Result<String, PipelineError> {
        let text = std::fs::read_to_string(file)?;
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            PipelineError::Generation(format!("{} is not valid JSON: {}", file.display(), e))
        })?;
        // complete_schema.json nests the structure under "flow"
        let value = match value {
            Value::Object(mut map) if map.contains_key("flow") => {
                map.remove("flow").unwrap_or(Value::Null)
            }
            other => other,
        };
        let structure = validate_value(value)?;
        if format == "json" {
            to_pretty_json(&structure)
        } else {
            Ok(format_validation_text(&structure))
        }
    }

    fn handle_projects_command(&self, command: &ProjectCommands) -> Result<String, PipelineError> {
        let store = self.projects();
        match command {
            ProjectCommands::List { format } => {
                let projects = store.list()?;
                if format == "json" {
                    to_pretty_json(&projects)
                } else {
                    Ok(format_project_list_text(&projects))
                }
            }
            ProjectCommands::Show { id, format } => match store.load(id) {
                Ok(record) => {
                    if format == "json" {
                        to_pretty_json(&record.metadata)
                    } else {
                        Ok(format_project_show_text(&record))
                    }
                }
                Err(load_err) => {
                    let failure = store.load_failure(id).map_err(|_| load_err)?;
                    if format == "json" {
                        to_pretty_json(&failure)
                    } else {
                        Ok(format_failure_record_text(id, &failure))
                    }
                }
            },
            ProjectCommands::Delete { id } => {
                store.delete(id)?;
                Ok(format!("Deleted project {}", id))
            }
        }
    }

    fn spawn_event_printer(&self, bus: &EventBus, request_id: &str) -> Option<JoinHandle<()>> {
        if !self.live_events {
            return None;
        }
        let color = std::io::stderr().is_terminal();
        let mut subscriber = EventSubscriber::for_request(bus, request_id);
        Some(tokio::spawn(async move {
            while let Some(event) = subscriber.recv().await {
                eprintln!("{}", format_event_line(&event, color));
                if event.is_terminal() {
                    break;
                }
            }
        }))
    }
}

/// Give the printer a moment to flush the terminal event, then drop it.
async fn finish_printer(printer: Option<JoinHandle<()>>) {
    if let Some(mut handle) = printer {
        if tokio::time::timeout(Duration::from_secs(1), &mut handle)
            .await
            .is_err()
        {
            debug!("Event printer did not finish in time");
            handle.abort();
        }
    }
}

/// Ctrl-C cancels the run cooperatively.
fn spawn_interrupt_watcher(cancel: CancelSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after the current stage");
            cancel.cancel();
        }
    })
}
