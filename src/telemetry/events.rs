//! Event schema for pipeline telemetry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, PipelineError};
use crate::pipeline::Stage;
use crate::telemetry::types::now_rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
        }
    }
}

/// One structured log event, attributable to exactly one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub request_id: String,
    pub stage: Stage,
    pub level: EventLevel,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl PipelineEvent {
    pub fn with_now(
        request_id: impl Into<String>,
        stage: Stage,
        level: EventLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            stage,
            level,
            message: message.into(),
            timestamp: now_rfc3339(),
            error_kind: None,
            data: None,
        }
    }

    /// Terminal failure event for `failed_stage`.
    pub fn failure(request_id: impl Into<String>, failed_stage: Stage, error: &PipelineError) -> Self {
        let mut event = Self::with_now(request_id, Stage::Error, EventLevel::Error, error.to_string());
        event.error_kind = Some(error.kind());
        event.data = Some(serde_json::json!({ "failed_stage": failed_stage }));
        event
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}
