//! Documentation Emitter and the on-disk project store.

pub mod metadata;
pub mod project;
pub mod readme;

pub use metadata::{complete_schema, FailureRecord, ProjectMetadata};
pub use project::{
    load_structure, project_dir_name, slugify, ProjectRecord, ProjectStatus, ProjectStore,
    ProjectSummary,
};
pub use readme::render_readme;

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::ExecutionResult;
use project::{
    write_json, COMPLETE_SCHEMA_FILE, FORMULA_PLAN_FILE, METADATA_FILE, README_FILE, SCHEMAS_DIR,
    STRUCTURE_FILE,
};

/// Where a run's artifacts landed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedProject {
    pub dir: PathBuf,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentationEmitter {
    store: ProjectStore,
}

impl DocumentationEmitter {
    pub fn new(store: ProjectStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Persist the JSON artifacts, then the README.
    ///
    /// JSON failures are errors. A README failure only adds a warning.
    pub fn emit(&self, result: &ExecutionResult) -> Result<EmittedProject, PipelineError> {
        let dir = self
            .store
            .create_project_dir(result.started_at, &result.prompt)?;
        let schemas = dir.join(SCHEMAS_DIR);
        let metadata = ProjectMetadata::from_result(result);

        write_json(&schemas.join(STRUCTURE_FILE), &result.structure)?;
        write_json(&schemas.join(FORMULA_PLAN_FILE), &result.formula_plan)?;
        write_json(
            &schemas.join(COMPLETE_SCHEMA_FILE),
            &complete_schema(result, &metadata),
        )?;
        write_json(&dir.join(METADATA_FILE), &metadata)?;

        let mut warnings = Vec::new();
        let mut with_dir = result.clone();
        with_dir.project_dir = Some(dir.clone());
        if let Err(e) = fs::write(dir.join(README_FILE), render_readme(&with_dir)) {
            warn!(
                request_id = %result.request_id,
                error = %e,
                "Failed to write README"
            );
            warnings.push(format!("README not written: {}", e));
        }

        info!(
            request_id = %result.request_id,
            project_dir = %dir.display(),
            "Project documentation written"
        );
        Ok(EmittedProject { dir, warnings })
    }
}
