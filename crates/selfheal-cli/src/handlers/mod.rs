//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains the execution logic for a CLI command and
//! the pure helpers it renders with.

pub mod bench;
pub mod ledger;
pub mod providers;

pub use bench::{execute_bench, render_bench_table, run_scenario, BenchReport, BenchResult};
pub use ledger::{execute_fixes, execute_list, execute_show, filter_events, fixable, open_ledger};
pub use providers::{execute_providers, render_providers};
