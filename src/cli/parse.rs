//! CLI parse: clap types for flowsheet. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// flowsheet - spreadsheet workflows from plain-language requirements
#[derive(Parser)]
#[command(name = "flowsheet")]
#[command(about = "Generate multi-sheet spreadsheet workflows from natural-language prompts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".", global = true)]
    pub workspace: PathBuf,

    /// Configuration file path (replaces the global and workspace config files)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable logging and live event output
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a workflow and create the spreadsheet
    Create {
        /// Plain-language description of the business process
        prompt: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Design structure and formulas only; no spreadsheet is created
    Plan {
        prompt: String,
        /// Output format (text or json)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Run several prompts concurrently
    Batch {
        #[arg(required = true)]
        prompts: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate a structure JSON document offline
    Validate {
        file: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Inspect persisted projects
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Write a default config/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List projects, newest first
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one project
    Show {
        id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete a project directory (the spreadsheet itself is not touched)
    Delete { id: String },
}
