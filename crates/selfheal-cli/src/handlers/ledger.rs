//! Ledger inspection handlers: list, show, fixes

use std::path::Path;

use selfheal::ledger::HealingEvent;
use selfheal::HealingLedger;

use crate::commands::{FixesArgs, ListArgs, OutputFormat, ShowArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{render_event_list, render_fix, Reporter};

/// Open an existing ledger. Unlike [`HealingLedger::open`], a missing file
/// is an error rather than created.
pub fn open_ledger(path: &Path) -> CliResult<HealingLedger> {
    if !path.is_file() {
        return Err(CliError::LedgerNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(HealingLedger::open(path)?)
}

/// Events whose test name contains `test`
#[must_use]
pub fn filter_events(events: Vec<HealingEvent>, test: Option<&str>) -> Vec<HealingEvent> {
    match test {
        Some(needle) => events
            .into_iter()
            .filter(|e| e.test_info.test_name.contains(needle))
            .collect(),
        None => events,
    }
}

fn reporter(config: &CliConfig) -> Reporter {
    Reporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

/// Execute the list command
pub fn execute_list(config: &CliConfig, args: &ListArgs) -> CliResult<()> {
    let ledger = open_ledger(&config.ledger_path)?;
    let events = filter_events(ledger.entries(), args.test.as_deref());

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
        OutputFormat::Text if events.is_empty() => reporter(config).warning("No healing events"),
        OutputFormat::Text => {
            println!("{}", render_event_list(&events, config.color.should_color()));
            if config.verbosity.is_verbose() {
                reporter(config).success(&format!(
                    "{} event(s) in {}",
                    events.len(),
                    config.ledger_path.display()
                ));
            }
        }
    }
    Ok(())
}

/// Execute the show command
pub fn execute_show(config: &CliConfig, args: &ShowArgs) -> CliResult<()> {
    let ledger = open_ledger(&config.ledger_path)?;
    let event = ledger
        .find(&args.id)
        .ok_or_else(|| CliError::event_not_found(&args.id))?;
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

/// Events to print fixes for
#[must_use]
pub fn fixable(events: Vec<HealingEvent>, include_review: bool) -> Vec<HealingEvent> {
    events
        .into_iter()
        .filter(|e| include_review || e.metadata.auto_fix_eligible)
        .collect()
}

/// Execute the fixes command
pub fn execute_fixes(config: &CliConfig, args: &FixesArgs) -> CliResult<()> {
    let ledger = open_ledger(&config.ledger_path)?;
    let events = fixable(ledger.entries(), args.all);

    if events.is_empty() {
        reporter(config).success("No fixes pending");
        return Ok(());
    }
    for event in &events {
        println!("{}", render_fix(event));
    }
    Ok(())
}
