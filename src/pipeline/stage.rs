//! Pipeline stage state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Init,
    Structure,
    Formula,
    Sheets,
    Docs,
    Complete,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Structure => "structure",
            Stage::Formula => "formula",
            Stage::Sheets => "sheets",
            Stage::Docs => "docs",
            Stage::Complete => "complete",
            Stage::Error => "error",
        }
    }

    /// The stage that follows on success; `None` for terminal stages.
    pub fn successor(self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::Structure),
            Stage::Structure => Some(Stage::Formula),
            Stage::Formula => Some(Stage::Sheets),
            Stage::Sheets => Some(Stage::Docs),
            Stage::Docs => Some(Stage::Complete),
            Stage::Complete | Stage::Error => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Error)
    }

    pub fn can_transition_to(self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Stage::Error || self.successor() == Some(next)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current stage of one run and rejects illegal transitions.
#[derive(Debug, Clone)]
pub struct StageMachine {
    current: Stage,
    failed_at: Option<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: Stage,
    pub to: Stage,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal stage transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StageMachine {
    pub fn new() -> Self {
        Self {
            current: Stage::Init,
            failed_at: None,
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    /// Stage that was active when the machine moved to `Error`.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    pub fn advance(&mut self, next: Stage) -> Result<Stage, IllegalTransition> {
        if !self.current.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.current,
                to: next,
            });
        }
        if next == Stage::Error {
            self.failed_at = Some(self.current);
        }
        self.current = next;
        Ok(next)
    }

    /// Move to `Error`, recording the failed stage. Idempotent once in `Error`.
    pub fn fail(&mut self) -> Stage {
        if self.current != Stage::Error {
            self.failed_at = Some(self.current);
            self.current = Stage::Error;
        }
        self.failed_at.unwrap_or(Stage::Init)
    }
}
