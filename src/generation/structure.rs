//! Structure Generator: requirement prompt in, validated `FlowStructure` out.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::PipelineError;
use crate::generation::prompts::{structure_system_prompt, structure_user_message};
use crate::generation::retry::RetryPolicy;
use crate::pipeline::Stage;
use crate::provider::{ChatMessage, CompletionClient, CompletionOptions};
use crate::schema::{extract_json, validate_value, FlowStructure};
use crate::telemetry::{EventEmitter, EventLevel};

pub struct StructureGenerator {
    client: Arc<dyn CompletionClient>,
    options: CompletionOptions,
    retry: RetryPolicy,
}

impl StructureGenerator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        options: CompletionOptions,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            options,
            retry,
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        events: &EventEmitter,
    ) -> Result<FlowStructure, PipelineError> {
        if prompt.trim().is_empty() {
            return Err(PipelineError::Generation(
                "Requirement prompt is empty".to_string(),
            ));
        }

        let messages = vec![
            ChatMessage::system(structure_system_prompt()),
            ChatMessage::user(structure_user_message(prompt)),
        ];

        let response = self
            .retry
            .run(
                "structure generation",
                || self.client.complete(messages.clone(), self.options.clone()),
                |attempt, err, delay| {
                    events.emit_with_data(
                        Stage::Structure,
                        EventLevel::Warn,
                        format!("Completion attempt {} failed, retrying: {}", attempt, err),
                        json!({ "attempt": attempt, "delay_ms": delay.as_millis() as u64 }),
                    )
                },
            )
            .await?;

        debug!(
            request_id = events.request_id(),
            provider = self.client.provider_name(),
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Structure completion received"
        );

        parse_structure(&response.content)
    }
}

/// Decode model text into a validated structure.
pub fn parse_structure(content: &str) -> Result<FlowStructure, PipelineError> {
    let json = extract_json(content)?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|e| PipelineError::Generation(format!("Structure response is not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(PipelineError::Generation(
            "Structure response must be a JSON object".to_string(),
        ));
    }
    validate_value(value)
}
