//! Selfheal CLI Library
//!
//! Command-line interface for reading the healing ledger written by
//! self-healing UI tests.

#![warn(missing_docs)]
#![allow(clippy::format_push_string)] // String building is clear and correct

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    BenchArgs, Cli, ColorArg, Commands, FixesArgs, ListArgs, OutputFormat, ShowArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_event_line, render_event_list, render_fix, Reporter};
