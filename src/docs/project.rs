//! On-disk project directories: naming, creation, listing, loading and deletion.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::docs::metadata::{FailureRecord, ProjectMetadata};
use crate::error::PipelineError;
use crate::schema::{FlowStructure, FormulaPlan};

pub const SCHEMAS_DIR: &str = "schemas";
pub const STRUCTURE_FILE: &str = "flow_structure.json";
pub const FORMULA_PLAN_FILE: &str = "formula_plan.json";
pub const COMPLETE_SCHEMA_FILE: &str = "complete_schema.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const FAILURE_FILE: &str = "failure.json";
pub const README_FILE: &str = "README.md";

const MAX_SLUG_CHARS: usize = 50;

/// Filesystem-safe slug of a prompt.
pub fn slugify(prompt: &str) -> String {
    let kept = prompt
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .take(MAX_SLUG_CHARS);

    // Runs of spaces and hyphens collapse to one underscore.
    let mut slug = String::new();
    let mut in_separator = false;
    for c in kept {
        if c == '-' || c.is_whitespace() {
            in_separator = true;
            continue;
        }
        if in_separator {
            slug.push('_');
            in_separator = false;
        }
        slug.push(c);
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "workflow".to_string()
    } else {
        slug.to_string()
    }
}

/// `YYYYmmdd_HHMMSS_slug`, sortable by creation time.
pub fn project_dir_name(started_at: DateTime<Utc>, prompt: &str) -> String {
    format!("{}_{}", started_at.format("%Y%m%d_%H%M%S"), slugify(prompt))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Complete,
    Failed,
}

/// One row of `projects list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub status: ProjectStatus,
    pub system_name: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub spreadsheet_url: Option<String>,
    pub sheets: usize,
}

/// Everything persisted for one completed project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    pub dir: PathBuf,
    pub metadata: ProjectMetadata,
    pub structure: Option<FlowStructure>,
    pub formula_plan: Option<FormulaPlan>,
    pub readme: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh project directory, suffixing `-2`, `-3`, ... on collision.
    pub fn create_project_dir(
        &self,
        started_at: DateTime<Utc>,
        prompt: &str,
    ) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.root)?;
        let base = project_dir_name(started_at, prompt);
        let mut attempt = 1u32;
        loop {
            let name = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            let dir = self.root.join(&name);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    fs::create_dir_all(dir.join(SCHEMAS_DIR))?;
                    debug!(project_dir = %dir.display(), "Created project directory");
                    return Ok(dir);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write `failure.json` for a run that left a partial spreadsheet behind.
    pub fn record_failure(
        &self,
        started_at: DateTime<Utc>,
        record: &FailureRecord,
    ) -> Result<PathBuf, PipelineError> {
        let dir = self.create_project_dir(started_at, &record.prompt)?;
        let path = dir.join(FAILURE_FILE);
        write_json(&path, record)?;
        Ok(path)
    }

    fn resolve_id(&self, id: &str) -> Result<PathBuf, PipelineError> {
        let invalid = id.is_empty()
            || id == "."
            || id.contains("..")
            || id.contains('/')
            || id.contains('\\');
        if invalid {
            return Err(PipelineError::Storage(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid project id '{}'", id),
            )));
        }
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(PipelineError::Storage(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Project '{}' not found in {}", id, self.root.display()),
            )));
        }
        Ok(dir)
    }

    /// Every readable project, newest first.
    pub fn list(&self) -> Result<Vec<ProjectSummary>, PipelineError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match summarize(&id, &entry.path()) {
                Some(summary) => projects.push(summary),
                None => debug!(project = %id, "Skipping directory without readable metadata"),
            }
        }
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(projects)
    }

    pub fn load(&self, id: &str) -> Result<ProjectRecord, PipelineError> {
        let dir = self.resolve_id(id)?;
        let metadata: ProjectMetadata = read_json(&dir.join(METADATA_FILE))?;
        let schemas = dir.join(SCHEMAS_DIR);
        Ok(ProjectRecord {
            id: id.to_string(),
            structure: read_json(&schemas.join(STRUCTURE_FILE)).ok(),
            formula_plan: read_json(&schemas.join(FORMULA_PLAN_FILE)).ok(),
            readme: fs::read_to_string(dir.join(README_FILE)).ok(),
            metadata,
            dir,
        })
    }

    pub fn load_failure(&self, id: &str) -> Result<FailureRecord, PipelineError> {
        let dir = self.resolve_id(id)?;
        read_json(&dir.join(FAILURE_FILE))
    }

    pub fn delete(&self, id: &str) -> Result<(), PipelineError> {
        let dir = self.resolve_id(id)?;
        fs::remove_dir_all(&dir)?;
        debug!(project_dir = %dir.display(), "Deleted project");
        Ok(())
    }
}

/// Re-parse the structure document of a project directory.
pub fn load_structure(dir: &Path) -> Result<FlowStructure, PipelineError> {
    read_json(&dir.join(SCHEMAS_DIR).join(STRUCTURE_FILE))
}

fn summarize(id: &str, dir: &Path) -> Option<ProjectSummary> {
    if let Ok(metadata) = read_json::<ProjectMetadata>(&dir.join(METADATA_FILE)) {
        return Some(ProjectSummary {
            id: id.to_string(),
            status: ProjectStatus::Complete,
            system_name: metadata.system.name,
            prompt: metadata.project_info.prompt,
            created_at: metadata.project_info.created_at,
            spreadsheet_url: metadata.spreadsheet.map(|s| s.url),
            sheets: metadata.system.total_sheets,
        });
    }
    let failure = read_json::<FailureRecord>(&dir.join(FAILURE_FILE)).ok()?;
    Some(ProjectSummary {
        id: id.to_string(),
        status: ProjectStatus::Failed,
        system_name: failure.structure.system_name.clone(),
        prompt: failure.prompt,
        created_at: failure.recorded_at,
        spreadsheet_url: failure.spreadsheet.map(|s| s.url),
        sheets: failure.structure.sheets.len(),
    })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let body = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}
