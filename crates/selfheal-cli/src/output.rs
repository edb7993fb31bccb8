//! Output formatting

use console::{style, Term};
use selfheal::ledger::HealingEvent;
use selfheal::Severity;

/// Status line writer for the terminal
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter writing to stderr
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "ERROR".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

fn severity_label(severity: Severity, use_color: bool) -> String {
    let label = format!("{:<8}", format!("{severity:?}").to_lowercase());
    if !use_color {
        return label;
    }
    match severity {
        Severity::Critical => style(label).red().bold().to_string(),
        Severity::High => style(label).yellow().to_string(),
        Severity::Medium => style(label).dim().to_string(),
    }
}

/// One summary line for an event
#[must_use]
pub fn render_event_line(event: &HealingEvent, use_color: bool) -> String {
    let issue = &event.locator_issue;
    format!(
        "{}  {}  {}  {} -> {}",
        event.id,
        severity_label(event.severity, use_color),
        event.test_info.test_name,
        issue.original_locator,
        issue.suggested_locator,
    )
}

/// Text listing, one line per event
#[must_use]
pub fn render_event_list(events: &[HealingEvent], use_color: bool) -> String {
    events
        .iter()
        .map(|event| render_event_line(event, use_color))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Suggested code changes of one event
#[must_use]
pub fn render_fix(event: &HealingEvent) -> String {
    let mut out = format!(
        "{} ({}, {})\n",
        event.id, event.test_info.test_name, event.root_cause_analysis.category
    );
    for change in &event.suggested_fix.code_changes {
        if let Some(file) = &change.file {
            out.push_str(&format!("  file: {file}\n"));
        }
        out.push_str(&format!("  - {}\n", change.old_code));
        out.push_str(&format!("  + {}\n", change.new_code));
    }
    if event.metadata.requires_human_review {
        out.push_str("  review: required\n");
    }
    out
}
