//! Selfheal CLI: inspect the healing ledger
//!
//! ## Usage
//!
//! ```bash
//! selfheal list                        # One line per healed locator
//! selfheal list --test login -f json   # Filter, as JSON
//! selfheal show HEAL-1A2B3C4D          # Full ledger entry
//! selfheal fixes                       # Suggested source edits
//! selfheal providers                   # AI providers and their env vars
//! selfheal bench -o bench.json         # Time each configured provider
//! ```

use clap::Parser;
use selfheal_cli::{
    handlers, Cli, CliConfig, CliResult, ColorChoice, Commands, Reporter, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    selfheal::load_dotenv();
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Reporter::new(config.color.should_color(), false).failure(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_ledger_path(cli.ledger.clone())
}

fn run(cli: &Cli, config: &CliConfig) -> CliResult<()> {
    tracing::debug!(ledger = %config.ledger_path.display(), "selfheal cli");
    match &cli.command {
        Commands::List(args) => handlers::execute_list(config, args),
        Commands::Show(args) => handlers::execute_show(config, args),
        Commands::Fixes(args) => handlers::execute_fixes(config, args),
        Commands::Providers => {
            handlers::execute_providers();
            Ok(())
        }
        Commands::Bench(args) => handlers::execute_bench(config, args),
    }
}
