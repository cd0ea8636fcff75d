//! flowsheet: spreadsheet workflows from natural-language requirements
//!
//! A language model designs a multi-sheet schema and its formulas; the result is validated,
//! materialized through the Google Sheets API, and documented on disk.

pub mod cli;
pub mod config;
pub mod docs;
pub mod error;
pub mod generation;
pub mod init;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod schema;
pub mod sheets;
pub mod telemetry;
