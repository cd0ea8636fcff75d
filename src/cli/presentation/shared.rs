//! Shared presentation: JSON rendering and live event lines.

use owo_colors::OwoColorize;
use serde::Serialize;

use crate::error::PipelineError;
use crate::telemetry::{EventLevel, PipelineEvent};

pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, PipelineError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// One line per event for the stderr progress stream.
pub fn format_event_line(event: &PipelineEvent, color: bool) -> String {
    let time = event.timestamp.get(11..19).unwrap_or(&event.timestamp);
    let stage = format!("{:<9}", event.stage.as_str());
    if !color {
        return format!("{} {} {}", time, stage, event.message);
    }
    let message = match event.level {
        EventLevel::Info => event.message.to_string(),
        EventLevel::Warn => event.message.yellow().to_string(),
        EventLevel::Error => event.message.red().bold().to_string(),
    };
    format!("{} {} {}", time.dimmed(), stage.cyan(), message)
}
