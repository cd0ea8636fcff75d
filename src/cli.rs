//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{exit_code, map_error, CommandError};
pub use parse::{Cli, Commands, ProjectCommands};
pub use route::RunContext;
