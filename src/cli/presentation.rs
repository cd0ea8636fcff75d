//! CLI presentation: text and json formatters per command family.

mod init;
mod projects;
mod shared;
mod workflow;

pub use init::format_init_result;
pub use projects::{
    format_failure_record_text, format_project_list_text, format_project_show_text,
};
pub use shared::{format_event_line, to_pretty_json};
pub use workflow::{
    format_batch_text, format_execution_text, format_plan_text, format_validation_text,
    BatchEntry,
};
