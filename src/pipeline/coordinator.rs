//! Drives one request through structure, formula, sheets and docs, publishing an event per
//! transition. Shared across tasks; each `run` owns its own state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::FlowsheetConfig;
use crate::docs::{DocumentationEmitter, FailureRecord, ProjectStore};
use crate::error::{BackendError, PipelineError};
use crate::generation::{FormulaGenerator, FormulaOutcome, RetryPolicy, StructureGenerator};
use crate::pipeline::cancel::CancelSignal;
use crate::pipeline::result::{ExecutionResult, PlanResult, WorkflowFailure};
use crate::pipeline::stage::{Stage, StageMachine};
use crate::provider::{CompletionClient, CompletionOptions, ProviderFactory};
use crate::schema::{FlowStructure, FormulaPlan};
use crate::sheets::{Materializer, MaterializerSettings, SpreadsheetBackend, SpreadsheetRef};
use crate::telemetry::{new_request_id, EventBus, EventEmitter, EventLevel};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub completion: CompletionOptions,
    pub retry: RetryPolicy,
    pub materializer: MaterializerSettings,
    pub projects_dir: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &FlowsheetConfig) -> Self {
        Self {
            completion: config.provider.completion_options(),
            retry: config.pipeline.retry_policy(),
            materializer: MaterializerSettings::from(&config.sheets),
            projects_dir: config.storage.projects_dir.clone(),
        }
    }
}

pub struct WorkflowPipeline {
    structure: StructureGenerator,
    formulas: FormulaGenerator,
    materializer: Materializer,
    docs: DocumentationEmitter,
    bus: EventBus,
}

/// Per-run bookkeeping.
struct RunState {
    events: EventEmitter,
    machine: StageMachine,
}

impl RunState {
    fn new(events: EventEmitter) -> Self {
        Self {
            events,
            machine: StageMachine::new(),
        }
    }

    fn request_id(&self) -> String {
        self.events.request_id().to_string()
    }

    /// Check cancellation, then move to `stage` and announce it.
    fn enter(
        &mut self,
        stage: Stage,
        cancel: &CancelSignal,
        message: &str,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if let Err(e) = self.machine.advance(stage) {
            error!(request_id = self.events.request_id(), error = %e, "Stage machine rejected transition");
        }
        self.events.info(stage, message);
        Ok(())
    }

    /// Discard a finished stage's output when cancellation arrived meanwhile.
    fn settle<T>(
        &self,
        cancel: &CancelSignal,
        outcome: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let value = outcome?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(value)
    }

    fn fail(&mut self, error: PipelineError, failure_record: Option<PathBuf>) -> WorkflowFailure {
        let spreadsheet = error.partial_spreadsheet_id().map(SpreadsheetRef::from_id);
        self.fail_holding(error, failure_record, spreadsheet)
    }

    /// Fail a run that already owns a spreadsheet.
    fn fail_holding(
        &mut self,
        error: PipelineError,
        failure_record: Option<PathBuf>,
        spreadsheet: Option<SpreadsheetRef>,
    ) -> WorkflowFailure {
        let failed_stage = self.machine.fail();
        self.events.failure(failed_stage, &error);
        WorkflowFailure {
            request_id: self.request_id(),
            failed_stage,
            error,
            failure_record,
            spreadsheet,
        }
    }
}

impl WorkflowPipeline {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        backend: Arc<dyn SpreadsheetBackend>,
        settings: PipelineSettings,
        bus: EventBus,
    ) -> Self {
        Self {
            structure: StructureGenerator::new(
                client.clone(),
                settings.completion.clone(),
                settings.retry.clone(),
            ),
            formulas: FormulaGenerator::new(
                client,
                settings.completion,
                settings.retry,
                settings.materializer.grid_rows,
            ),
            materializer: Materializer::new(backend, settings.materializer),
            docs: DocumentationEmitter::new(ProjectStore::new(settings.projects_dir)),
            bus,
        }
    }

    /// Build the provider client and the Google Sheets backend from configuration.
    pub fn from_config(config: &FlowsheetConfig, bus: EventBus) -> Result<Self, PipelineError> {
        let provider = config.provider.to_model_provider()?;
        let client = ProviderFactory::create_client(
            &provider,
            Duration::from_secs(config.pipeline.request_timeout_secs),
        )?;
        let backend = config.sheets.build_backend().map_err(|e| match e {
            BackendError::Auth(msg) => PipelineError::Auth(msg),
            other => PipelineError::Config(other.to_string()),
        })?;
        Ok(Self::new(
            client,
            backend,
            PipelineSettings::from_config(config),
            bus,
        ))
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn projects(&self) -> &ProjectStore {
        self.docs.store()
    }

    /// Run the full pipeline under a fresh request id.
    pub async fn run(
        &self,
        prompt: &str,
        cancel: &CancelSignal,
    ) -> Result<ExecutionResult, WorkflowFailure> {
        self.run_with_id(new_request_id(), prompt, cancel).await
    }

    /// Run under a caller-chosen request id, so observers can subscribe before the first event.
    pub async fn run_with_id(
        &self,
        request_id: String,
        prompt: &str,
        cancel: &CancelSignal,
    ) -> Result<ExecutionResult, WorkflowFailure> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut run = RunState::new(self.bus.emitter(request_id));

        info!(request_id = run.events.request_id(), "Workflow started");
        run.events.info(Stage::Init, "Workflow started");

        let (structure, outcome) = match self.design(&mut run, prompt, cancel).await {
            Ok(designed) => designed,
            Err(e) => return Err(run.fail(e, None)),
        };

        if let Err(e) = run.enter(Stage::Sheets, cancel, "Creating spreadsheet") {
            return Err(run.fail(e, None));
        }
        let materialized = self
            .materializer
            .materialize(&structure, &outcome.plan, &run.events)
            .await;
        let materialized = match materialized {
            Ok(m) => m,
            Err(e) => {
                let record =
                    self.record_failure(&run, started_at, prompt, &e, &structure, &outcome.plan, None);
                return Err(run.fail(e, record));
            }
        };
        if cancel.is_cancelled() {
            let error = PipelineError::Cancelled;
            let spreadsheet = materialized.spreadsheet;
            let record = self.record_failure(
                &run,
                started_at,
                prompt,
                &error,
                &structure,
                &outcome.plan,
                Some(spreadsheet.clone()),
            );
            return Err(run.fail_holding(error, record, Some(spreadsheet)));
        }

        let mut result = ExecutionResult {
            request_id: run.request_id(),
            prompt: prompt.to_string(),
            structure,
            formula_plan: outcome.plan,
            rejected_formulas: outcome.rejected,
            started_at,
            completed_at: started_at,
            elapsed_ms: 0,
            sheet_stats: materialized.sheet_stats,
            spreadsheet: Some(materialized.spreadsheet),
            project_dir: None,
            warnings: materialized.warnings,
        };

        if let Err(e) = run.enter(Stage::Docs, cancel, "Writing project documentation") {
            let spreadsheet = result.spreadsheet.clone();
            return Err(run.fail_holding(e, None, spreadsheet));
        }
        result.elapsed_ms = clock.elapsed().as_millis() as u64;
        result.completed_at = Utc::now();
        match self.docs.emit(&result) {
            Ok(emitted) => {
                result.project_dir = Some(emitted.dir);
                for warning in emitted.warnings {
                    run.events.warn(Stage::Docs, warning.clone());
                    result.warnings.push(warning);
                }
            }
            Err(e) => {
                warn!(request_id = %result.request_id, error = %e, "Project documentation not written");
                let warning = format!("Project documentation not written: {}", e);
                run.events.warn(Stage::Docs, warning.clone());
                result.warnings.push(warning);
            }
        }
        if cancel.is_cancelled() {
            let spreadsheet = result.spreadsheet.clone();
            return Err(run.fail_holding(PipelineError::Cancelled, None, spreadsheet));
        }

        if let Err(e) = run.machine.advance(Stage::Complete) {
            error!(request_id = %result.request_id, error = %e, "Stage machine rejected transition");
        }
        result.elapsed_ms = clock.elapsed().as_millis() as u64;
        result.completed_at = Utc::now();
        run.events.emit_with_data(
            Stage::Complete,
            EventLevel::Info,
            "Workflow completed",
            json!({
                "spreadsheet_url": result.spreadsheet.as_ref().map(|s| s.url.clone()),
                "project_dir": result.project_dir.as_ref().map(|p| p.display().to_string()),
                "elapsed_ms": result.elapsed_ms,
            }),
        );
        info!(
            request_id = %result.request_id,
            elapsed_ms = result.elapsed_ms,
            sheets = result.structure.sheets.len(),
            formulas = result.total_formulas(),
            "Workflow completed"
        );
        Ok(result)
    }

    /// Structure and formula plan only. The spreadsheet backend is never called.
    pub async fn plan(
        &self,
        prompt: &str,
        cancel: &CancelSignal,
    ) -> Result<PlanResult, WorkflowFailure> {
        let mut run = RunState::new(self.bus.emitter(new_request_id()));
        run.events.info(Stage::Init, "Planning started");

        match self.design(&mut run, prompt, cancel).await {
            Ok((structure, outcome)) => {
                run.events.info(
                    Stage::Formula,
                    format!(
                        "Plan ready: {} sheets, {} formulas",
                        structure.sheets.len(),
                        outcome.plan.formulas.len()
                    ),
                );
                Ok(PlanResult {
                    request_id: run.request_id(),
                    structure,
                    formula_plan: outcome.plan,
                    rejected_formulas: outcome.rejected,
                })
            }
            Err(e) => Err(run.fail(e, None)),
        }
    }

    async fn design(
        &self,
        run: &mut RunState,
        prompt: &str,
        cancel: &CancelSignal,
    ) -> Result<(FlowStructure, FormulaOutcome), PipelineError> {
        run.enter(Stage::Structure, cancel, "Generating workflow structure")?;
        let structure = self.structure.generate(prompt, &run.events).await;
        let structure = run.settle(cancel, structure)?;
        run.events.emit_with_data(
            Stage::Structure,
            EventLevel::Info,
            format!("Designed '{}'", structure.system_name),
            json!({
                "sheets": structure.sheets.len(),
                "columns": structure.total_columns(),
            }),
        );

        run.enter(Stage::Formula, cancel, "Generating formulas")?;
        let outcome = self.formulas.generate(&structure, &run.events).await;
        let outcome = run.settle(cancel, outcome)?;
        run.events.emit_with_data(
            Stage::Formula,
            EventLevel::Info,
            format!("Accepted {} formulas", outcome.plan.formulas.len()),
            json!({
                "accepted": outcome.plan.formulas.len(),
                "rejected": outcome.rejected.len(),
            }),
        );
        Ok((structure, outcome))
    }

    /// Write `failure.json` when the run leaves a spreadsheet behind. `spreadsheet` overrides
    /// the partial id carried by `error`.
    #[allow(clippy::too_many_arguments)]
    fn record_failure(
        &self,
        run: &RunState,
        started_at: DateTime<Utc>,
        prompt: &str,
        error: &PipelineError,
        structure: &FlowStructure,
        plan: &FormulaPlan,
        spreadsheet: Option<SpreadsheetRef>,
    ) -> Option<PathBuf> {
        let spreadsheet = spreadsheet
            .or_else(|| error.partial_spreadsheet_id().map(SpreadsheetRef::from_id))?;
        let record = FailureRecord::new(
            run.events.request_id(),
            prompt,
            run.machine.current(),
            error,
            structure,
            plan,
        )
        .with_spreadsheet(spreadsheet);
        match self.docs.store().record_failure(started_at, &record) {
            Ok(path) => {
                warn!(
                    request_id = run.events.request_id(),
                    failure_record = %path.display(),
                    "Partial spreadsheet left behind"
                );
                Some(path)
            }
            Err(e) => {
                error!(request_id = run.events.request_id(), error = %e, "Could not write failure record");
                None
            }
        }
    }
}
