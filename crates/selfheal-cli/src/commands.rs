//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Selfheal: inspect healing ledgers written by self-healing UI tests
#[derive(Parser, Debug)]
#[command(name = "selfheal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Ledger file
    #[arg(
        long,
        env = "SELFHEAL_LEDGER",
        default_value = selfheal::config::DEFAULT_LEDGER_PATH,
        global = true
    )]
    pub ledger: PathBuf,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List healing events
    List(ListArgs),

    /// Show one healing event as JSON
    Show(ShowArgs),

    /// Print suggested locator fixes
    Fixes(FixesArgs),

    /// List recognised AI providers and their environment variables
    Providers,

    /// Benchmark configured providers on a fixed healing scenario
    Bench(BenchArgs),
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Only events whose test name contains this text
    #[arg(short, long)]
    pub test: Option<String>,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Event id, e.g. HEAL-1A2B3C4D
    pub id: String,
}

/// Arguments for the fixes command
#[derive(Parser, Debug)]
pub struct FixesArgs {
    /// Include events that need human review
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the bench command
#[derive(Parser, Debug)]
pub struct BenchArgs {
    /// Provider to benchmark (repeatable); defaults to every configured one
    #[arg(short, long = "provider")]
    pub providers: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One line per event
    #[default]
    Text,
    /// JSON array
    Json,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
