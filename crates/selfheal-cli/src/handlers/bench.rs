//! Bench handler
//!
//! Runs one fixed healing scenario per provider on the in-memory engine and
//! reports how long each provider took and whether its suggestion worked.
//! The scenario is a checkout page whose "Submit order" button was renamed
//! to "Place order"; the test still queries the old accessible name.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use selfheal::{
    HealConfig, Healer, HealingPage, MockElement, MockEngine, ProviderConfig, ProviderKind,
    TestContext,
};
use serde::Serialize;

use crate::commands::{BenchArgs, OutputFormat};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;

const SCENARIO_URL: &str = "https://shop.example/checkout";
const SCENARIO_TEST: &str = "selfheal-bench::checkout::test_place_order";
const SCENARIO_HTML: &str = r#"<html><body>
<form id="checkout">
  <h1>Checkout</h1>
  <input id="email" type="email" placeholder="Email">
  <button id="place-order" class="btn primary" type="submit">Place order</button>
</form>
</body></html>"#;

/// Role and accessible name the scenario's test still uses
pub const STALE_QUERY: (&str, &str) = ("button", "Submit order");

/// Selectors that resolve to the renamed button
pub const SCENARIO_SELECTORS: &[&str] = &[
    "#place-order",
    "button#place-order",
    "button[type='submit']",
    "button[type=\"submit\"]",
    "#checkout button",
    "form button",
    "button.btn.primary",
    "button.primary",
    ".btn.primary",
    "text=Place order",
    "button:has-text('Place order')",
    "button:has-text(\"Place order\")",
    "//button[@id='place-order']",
    "//button[text()='Place order']",
];

/// Outcome of one provider run
#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    /// Canonical provider name
    pub provider: String,
    /// Model or deployment
    pub model: String,
    /// When the run started
    pub timestamp: DateTime<Utc>,
    /// Whether the healed click succeeded
    pub success: bool,
    /// Seconds for the whole scenario
    pub total_time: f64,
    /// Seconds for the click, heal and retry
    pub healing_time: f64,
    /// Locator the provider proposed, if any
    pub suggested_locator: Option<String>,
    /// Error text of a failed run
    pub error: Option<String>,
}

impl BenchResult {
    fn failed(provider: &str, model: &str, timestamp: DateTime<Utc>, error: String) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            timestamp,
            success: false,
            total_time: 0.0,
            healing_time: 0.0,
            suggested_locator: None,
            error: Some(error),
        }
    }
}

/// Aggregate counts over all runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchSummary {
    /// Number of runs
    pub total_tests: usize,
    /// Successful runs
    pub passed: usize,
    /// Failed runs
    pub failed: usize,
    /// Percentage of successful runs
    pub success_rate: f64,
}

/// Full report, written as JSON
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    /// When the report was built
    pub timestamp: DateTime<Utc>,
    /// One entry per provider run
    pub results: Vec<BenchResult>,
    /// Totals
    pub summary: BenchSummary,
}

impl BenchReport {
    /// Build a report and its summary
    #[must_use]
    pub fn new(results: Vec<BenchResult>) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        let total_tests = results.len();
        let success_rate = if total_tests == 0 {
            0.0
        } else {
            round2(passed as f64 / total_tests as f64 * 100.0)
        };
        Self {
            timestamp: Utc::now(),
            summary: BenchSummary {
                total_tests,
                passed,
                failed: total_tests - passed,
                success_rate,
            },
            results,
        }
    }
}

/// Whether a provider will run, and why not
#[derive(Debug)]
pub enum Selection {
    /// Resolved and ready to run
    Run(ProviderConfig),
    /// Left out of the run
    Skip {
        /// Provider left out
        kind: ProviderKind,
        /// Why
        reason: String,
    },
}

/// Decide which providers to benchmark.
///
/// With no explicit request, every provider whose credentials resolve from
/// `env` runs; Ollama additionally needs `OLLAMA_BASE_URL`, since a local
/// server is not assumed.
pub fn select_providers<F>(requested: &[ProviderKind], env: F) -> Vec<Selection>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = !requested.is_empty();
    let kinds = if explicit {
        requested.to_vec()
    } else {
        ProviderKind::ALL.to_vec()
    };
    kinds
        .into_iter()
        .map(|kind| {
            let has_server = env("OLLAMA_BASE_URL").is_some_and(|v| !v.trim().is_empty());
            if !explicit && kind == ProviderKind::Ollama && !has_server {
                return Selection::Skip {
                    kind,
                    reason: "OLLAMA_BASE_URL not set".to_string(),
                };
            }
            match ProviderConfig::resolve(Some(kind.as_str()), None, None, &env) {
                Ok(config) => Selection::Run(config),
                Err(e) => Selection::Skip {
                    kind,
                    reason: e.to_string(),
                },
            }
        })
        .collect()
}

fn scenario_engine() -> MockEngine {
    SCENARIO_SELECTORS.iter().fold(
        MockEngine::new().with_content(SCENARIO_HTML),
        |engine, selector| {
            engine.with_element(*selector, MockElement::new().with_text("Place order"))
        },
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn secs(duration: Duration) -> f64 {
    round2(duration.as_secs_f64())
}

/// Run the checkout scenario once with `healer`, writing heals to `ledger_path`.
pub async fn run_scenario(
    provider: &str,
    model: &str,
    healer: Healer,
    ledger_path: &Path,
) -> BenchResult {
    let timestamp = Utc::now();
    let started = Instant::now();

    let page = match HealingPage::with_healer(
        scenario_engine(),
        healer,
        HealConfig::new().ledger_path(ledger_path),
    ) {
        Ok(page) => page.with_context(TestContext::parse(SCENARIO_TEST)),
        Err(e) => return BenchResult::failed(provider, model, timestamp, e.to_string()),
    };
    if let Err(e) = page.goto(SCENARIO_URL).await {
        return BenchResult::failed(provider, model, timestamp, e.to_string());
    }

    let (role, name) = STALE_QUERY;
    let mut button = page.get_by_role(role, Some(name));
    let original = button.descriptor().to_string();

    let healing_started = Instant::now();
    let outcome = button.click().await;
    let healing_time = secs(healing_started.elapsed());

    let suggested_locator = (button.descriptor() != original).then(|| button.descriptor().to_string());
    let success = outcome.is_ok() && suggested_locator.is_some();
    let error = match outcome {
        Ok(()) if suggested_locator.is_none() => Some("click succeeded without healing".to_string()),
        Ok(()) => None,
        Err(e) => Some(e.to_string()),
    };

    BenchResult {
        provider: provider.to_string(),
        model: model.to_string(),
        timestamp,
        success,
        total_time: secs(started.elapsed()),
        healing_time,
        suggested_locator,
        error,
    }
}

/// Summary table and statistics
#[must_use]
pub fn render_bench_table(report: &BenchReport) -> String {
    let mut out = format!(
        "{:<14} {:<36} {:<6} {:>9} {:>12}  {}\n",
        "Provider", "Model", "Status", "Time (s)", "Healing (s)", "Suggested"
    );
    out.push_str(&"-".repeat(100));
    out.push('\n');
    for r in &report.results {
        out.push_str(&format!(
            "{:<14} {:<36} {:<6} {:>9.2} {:>12.2}  {}\n",
            r.provider,
            r.model,
            if r.success { "PASS" } else { "FAIL" },
            r.total_time,
            r.healing_time,
            r.suggested_locator.as_deref().unwrap_or("-"),
        ));
    }

    let summary = &report.summary;
    out.push_str(&format!(
        "\nTotal: {}  Passed: {}  Failed: {}  Success rate: {:.1}%\n",
        summary.total_tests, summary.passed, summary.failed, summary.success_rate
    ));

    let passed: Vec<&BenchResult> = report.results.iter().filter(|r| r.success).collect();
    if let Some(fastest) = passed
        .iter()
        .min_by(|a, b| a.total_time.total_cmp(&b.total_time))
    {
        let count = passed.len() as f64;
        let avg_total: f64 = passed.iter().map(|r| r.total_time).sum::<f64>() / count;
        let avg_healing: f64 = passed.iter().map(|r| r.healing_time).sum::<f64>() / count;
        out.push_str(&format!(
            "Average time: {avg_total:.2}s  Average healing: {avg_healing:.2}s\n"
        ));
        out.push_str(&format!(
            "Fastest: {} ({}) {:.2}s\n",
            fastest.provider, fastest.model, fastest.total_time
        ));
    }
    out
}

fn scratch_ledger(kind: ProviderKind) -> PathBuf {
    std::env::temp_dir().join(format!(
        "selfheal-bench-{}-{}.json",
        kind.as_str(),
        std::process::id()
    ))
}

fn remove_scratch(path: &Path) {
    let mut lock = path.as_os_str().to_os_string();
    lock.push(".lock");
    let _ = fs::remove_file(path);
    let _ = fs::remove_file(PathBuf::from(lock));
}

/// Execute the bench command
///
/// # Errors
///
/// Returns an error for an unknown provider name, when no provider can
/// run, or when the report cannot be written.
pub fn execute_bench(config: &CliConfig, args: &BenchArgs) -> CliResult<()> {
    let requested = args
        .providers
        .iter()
        .map(|name| name.parse::<ProviderKind>())
        .collect::<Result<Vec<_>, _>>()?;
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let runtime = tokio::runtime::Runtime::new()?;

    let mut results = Vec::new();
    for selection in select_providers(&requested, |key| std::env::var(key).ok()) {
        let provider = match selection {
            Selection::Run(provider) => provider,
            Selection::Skip { kind, reason } => {
                reporter.warning(&format!("Skipping {kind}: {reason}"));
                continue;
            }
        };
        let kind = provider.kind;
        let model = provider.model.clone();
        tracing::info!(provider = kind.as_str(), model = %model, "benchmarking provider");

        let result = match Healer::new(provider) {
            Ok(healer) => {
                let ledger = scratch_ledger(kind);
                let result =
                    runtime.block_on(run_scenario(kind.as_str(), &model, healer, &ledger));
                remove_scratch(&ledger);
                result
            }
            Err(e) => BenchResult::failed(kind.as_str(), &model, Utc::now(), e.to_string()),
        };
        if result.success {
            reporter.success(&format!("{kind}: healed in {:.2}s", result.healing_time));
        } else {
            reporter.warning(&format!(
                "{kind}: {}",
                result.error.as_deref().unwrap_or("heal failed")
            ));
        }
        results.push(result);
    }

    if results.is_empty() {
        return Err(CliError::config(
            "no provider is configured; see `selfheal providers`",
        ));
    }

    let report = BenchReport::new(results);
    let json = serde_json::to_string_pretty(&report)?;
    match args.format {
        OutputFormat::Text => print!("{}", render_bench_table(&report)),
        OutputFormat::Json => println!("{json}"),
    }
    if let Some(path) = &args.output {
        fs::write(path, &json)?;
        reporter.success(&format!("Detailed results saved to {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use selfheal::{ScriptedGenerator, ELEMENT_MISSING};
    use std::sync::Arc;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    fn run_names(selections: &[Selection]) -> Vec<&'static str> {
        selections
            .iter()
            .filter_map(|s| match s {
                Selection::Run(config) => Some(config.kind.as_str()),
                Selection::Skip { .. } => None,
            })
            .collect()
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_only_configured_providers_run() {
            let selections = select_providers(
                &[],
                env_of(&[("OPENAI_API_KEY", "sk"), ("GOOGLE_API_KEY", "g")]),
            );
            assert_eq!(run_names(&selections), vec!["gemini", "openai"]);
            assert_eq!(selections.len(), ProviderKind::ALL.len());
        }

        #[test]
        fn test_ollama_needs_base_url_unless_requested() {
            let selections = select_providers(&[], env_of(&[]));
            assert!(run_names(&selections).is_empty());

            let selections =
                select_providers(&[], env_of(&[("OLLAMA_BASE_URL", "http://gpu:11434")]));
            assert_eq!(run_names(&selections), vec!["ollama"]);

            let selections = select_providers(&[ProviderKind::Ollama], env_of(&[]));
            assert_eq!(run_names(&selections), vec!["ollama"]);
        }

        #[test]
        fn test_requested_provider_without_key_is_skipped_with_reason() {
            let selections = select_providers(&[ProviderKind::Anthropic], env_of(&[]));
            match &selections[..] {
                [Selection::Skip { kind, reason }] => {
                    assert_eq!(*kind, ProviderKind::Anthropic);
                    assert!(reason.contains("ANTHROPIC_API_KEY"));
                }
                other => panic!("expected one skip, got {other:?}"),
            }
        }
    }

    mod scenario_tests {
        use super::*;
        use tempfile::TempDir;

        async fn run_with(generator: ScriptedGenerator) -> (TempDir, BenchResult) {
            let dir = TempDir::new().unwrap();
            let healer = Healer::from_generator(Arc::new(generator));
            let result =
                run_scenario("scripted", "m", healer, &dir.path().join("bench.json")).await;
            (dir, result)
        }

        #[tokio::test]
        async fn test_good_suggestion_passes() {
            let (dir, result) = run_with(ScriptedGenerator::new().respond("#place-order")).await;
            assert!(result.success, "{result:?}");
            assert_eq!(result.suggested_locator.as_deref(), Some("#place-order"));
            assert!(result.error.is_none());
            assert!(result.total_time >= result.healing_time);

            let ledger = selfheal::HealingLedger::open(dir.path().join("bench.json")).unwrap();
            assert_eq!(ledger.entries().len(), 1);
        }

        #[tokio::test]
        async fn test_every_scenario_selector_resolves() {
            for selector in SCENARIO_SELECTORS {
                let (_dir, result) = run_with(ScriptedGenerator::new().respond(*selector)).await;
                assert!(result.success, "{selector}: {result:?}");
            }
        }

        #[tokio::test]
        async fn test_wrong_suggestion_fails_but_is_reported() {
            let (_dir, result) = run_with(ScriptedGenerator::new().respond("#submit")).await;
            assert!(!result.success);
            assert_eq!(result.suggested_locator.as_deref(), Some("#submit"));
            assert!(result.error.is_some());
        }

        #[tokio::test]
        async fn test_no_suggestion_fails() {
            let (_dir, result) = run_with(ScriptedGenerator::new().respond(ELEMENT_MISSING)).await;
            assert!(!result.success);
            assert!(result.suggested_locator.is_none());
            assert!(result.error.unwrap().contains("Timeout"));
        }
    }

    mod report_tests {
        use super::*;

        fn result(provider: &str, success: bool, total: f64) -> BenchResult {
            BenchResult {
                provider: provider.to_string(),
                model: "m".to_string(),
                timestamp: Utc::now(),
                success,
                total_time: total,
                healing_time: total / 2.0,
                suggested_locator: success.then(|| "#place-order".to_string()),
                error: (!success).then(|| "Timeout".to_string()),
            }
        }

        #[test]
        fn test_summary_counts() {
            let report = BenchReport::new(vec![
                result("gemini", true, 1.5),
                result("openai", true, 0.8),
                result("ollama", false, 3.0),
            ]);
            assert_eq!(
                report.summary,
                BenchSummary {
                    total_tests: 3,
                    passed: 2,
                    failed: 1,
                    success_rate: 66.67,
                }
            );
        }

        #[test]
        fn test_json_layout() {
            let report = BenchReport::new(vec![result("openai", true, 0.8)]);
            let json = serde_json::to_value(&report).unwrap();
            assert_eq!(json["summary"]["total_tests"], 1);
            assert_eq!(json["results"][0]["provider"], "openai");
            assert_eq!(json["results"][0]["suggested_locator"], "#place-order");
            assert!(json["results"][0]["error"].is_null());
            assert!(json["timestamp"].is_string());
        }

        #[test]
        fn test_table_names_fastest_passing_provider() {
            let report = BenchReport::new(vec![
                result("gemini", true, 1.5),
                result("openai", true, 0.8),
                result("ollama", false, 0.1),
            ]);
            let table = render_bench_table(&report);
            assert!(table.contains("Fastest: openai (m) 0.80s"));
            assert!(table.contains("Success rate: 66.7%"));
            assert!(table.lines().any(|l| l.starts_with("ollama") && l.contains("FAIL")));
        }

        #[test]
        fn test_table_without_passes_has_no_statistics() {
            let report = BenchReport::new(vec![result("ollama", false, 0.1)]);
            assert!(!render_bench_table(&report).contains("Fastest"));
        }
    }
}
