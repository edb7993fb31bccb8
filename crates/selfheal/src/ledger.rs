//! Healing ledger: a deduplicated JSON record of every applied heal.
//!
//! The file holds one pretty-printed JSON array. Each entry is keyed by
//! `(test_info.test_name, locator_issue.original_locator)`; writing an event
//! whose key already exists replaces that entry wholesale.
//!
//! # Concurrency
//!
//! Every upsert holds an in-process mutex and an exclusive `fd-lock` on a
//! sibling `<ledger>.lock` file for the whole read-modify-write, so test
//! binaries running in parallel against one ledger are serialized.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::{self, CodeChange, LocatorKind, RootCause, Severity};
use crate::config::DEFAULT_CONFIDENCE;
use crate::context::{HealContext, TestContext};
use crate::result::{HealError, HealResult};

/// Agent name written to each entry
pub const HEALER_AGENT: &str = concat!("selfheal/", env!("CARGO_PKG_VERSION"));

/// Strategy name written to each entry
pub const HEALING_STRATEGY: &str = "ai_locator_suggestion";

/// Raw facts about one applied heal, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct HealingRecord {
    /// Test the heal happened in
    pub test: TestContext,
    /// Descriptor that failed
    pub original_locator: String,
    /// Replacement selector
    pub suggested_locator: String,
    /// Action that failed
    pub action: String,
    /// Engine error class, e.g. `TimeoutError`
    pub error_type: String,
    /// Engine error text
    pub error_message: String,
    /// Page URL at failure time
    pub page_url: String,
    /// Truncated page markup
    pub page_excerpt: String,
    /// Recorded confidence
    pub confidence: f64,
    /// Environment at failure time
    pub context: HealContext,
    /// Provider that produced the suggestion
    pub provider: String,
}

impl HealingRecord {
    /// Record for `test` with placeholder error and environment details
    pub fn new(
        test: TestContext,
        original_locator: impl Into<String>,
        suggested_locator: impl Into<String>,
    ) -> Self {
        Self {
            test,
            original_locator: original_locator.into(),
            suggested_locator: suggested_locator.into(),
            action: "unknown".to_string(),
            error_type: "TimeoutError".to_string(),
            error_message: String::new(),
            page_url: String::new(),
            page_excerpt: String::new(),
            confidence: DEFAULT_CONFIDENCE,
            context: HealContext {
                browser: "unknown".to_string(),
                viewport: "unknown".to_string(),
                failure_count: 1,
                stack_trace: String::new(),
            },
            provider: "unknown".to_string(),
        }
    }

    /// Set the failed action and its error
    #[must_use]
    pub fn with_failure(
        mut self,
        action: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        self.action = action.into();
        self.error_message = error_message.into();
        self.context.stack_trace.clone_from(&self.error_message);
        self
    }
}

/// Entry status. A failed heal is never recorded, so there is one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealStatus {
    /// Replacement locator applied
    Healed,
}

/// `error_details` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Engine error class
    pub error_type: String,
    /// Engine error text
    pub error_message: String,
    /// Raw failure text
    pub stack_trace: String,
    /// Failures in this call
    pub failure_count: u32,
    /// Action that failed
    pub action_attempted: String,
}

/// `locator_issue` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorIssue {
    /// Descriptor that failed
    pub original_locator: String,
    /// Its structural kind
    pub original_locator_type: LocatorKind,
    /// Short failure description
    pub failed_reason: String,
    /// Replacement selector
    pub suggested_locator: String,
    /// Its structural kind
    pub suggested_locator_type: LocatorKind,
    /// Recorded confidence
    pub confidence_score: f64,
    /// Other candidates (the healer asks for one)
    #[serde(default)]
    pub alternative_locators: Vec<String>,
}

/// `code_context` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeContext {
    /// Page URL at failure time
    pub page_url: String,
    /// Truncated page markup
    pub page_excerpt: String,
    /// Browser kind
    pub browser: String,
    /// Viewport
    pub viewport: String,
}

/// `root_cause_analysis` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCauseAnalysis {
    /// Inferred cause
    pub category: RootCause,
    /// Explanation
    pub description: String,
    /// Always `true`: derived from string patterns only
    pub heuristic: bool,
}

/// `suggested_fix` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    /// Kind of fix
    pub fix_type: String,
    /// Priority, same scale as severity
    pub priority: Severity,
    /// Source edits
    pub code_changes: Vec<CodeChange>,
    /// Other ways to fix the test
    #[serde(default)]
    pub alternative_fixes: Vec<String>,
    /// Steps to confirm the fix
    #[serde(default)]
    pub validation_steps: Vec<String>,
}

/// `ai_recommendations` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRecommendations {
    /// Provider that produced the suggestion
    pub provider: String,
    /// Guidance for the original locator kind
    pub best_practices: Vec<String>,
    /// Kind the suggestion uses
    pub preferred_locator_type: LocatorKind,
}

/// `metadata` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Writer name and version
    pub healer_agent: String,
    /// Healing strategy
    pub healing_strategy: String,
    /// Whether a plain locator swap should fix the test
    pub auto_fix_eligible: bool,
    /// Whether a person should look before applying the fix
    pub requires_human_review: bool,
    /// Filter tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingEvent {
    /// `HEAL-XXXXXXXX`, stable per key
    pub id: String,
    /// When the heal happened
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub severity: Severity,
    /// Status
    pub status: HealStatus,
    /// Test identity
    pub test_info: TestContext,
    /// Failure details
    pub error_details: ErrorDetails,
    /// Original and replacement locators
    pub locator_issue: LocatorIssue,
    /// Page context
    pub code_context: CodeContext,
    /// Root cause guess
    pub root_cause_analysis: RootCauseAnalysis,
    /// Proposed edit
    pub suggested_fix: SuggestedFix,
    /// Guidance
    pub ai_recommendations: AiRecommendations,
    /// Writer metadata and tags
    pub metadata: EventMetadata,
}

impl HealingEvent {
    /// Enrich a record, stamped with the current time
    #[must_use]
    pub fn from_record(record: &HealingRecord) -> Self {
        Self::from_record_at(record, Utc::now())
    }

    /// Enrich a record with an explicit timestamp
    #[must_use]
    pub fn from_record_at(record: &HealingRecord, timestamp: DateTime<Utc>) -> Self {
        let original = &record.original_locator;
        let suggested = &record.suggested_locator;
        let original_kind = analysis::classify_locator(original);
        let suggested_kind = analysis::classify_locator(suggested);
        let cause = analysis::root_cause(original, suggested);
        let severity = analysis::severity(cause);
        let auto_fix_eligible = cause.is_simple_rename() && suggested_kind != LocatorKind::Xpath;

        let test_name = &record.test.test_name;
        let location = record.test.test_file.as_deref().unwrap_or(test_name);
        let mut alternative_fixes = Vec::new();
        if suggested_kind != LocatorKind::TestId {
            alternative_fixes
                .push("Add a data-testid attribute to the element and query it by test id".to_string());
        }
        if original_kind.is_semantic() {
            alternative_fixes
                .push("Update the expected name or text in the test to match the page".to_string());
        }

        Self {
            id: analysis::event_id(test_name, original),
            timestamp,
            severity,
            status: HealStatus::Healed,
            test_info: record.test.clone(),
            error_details: ErrorDetails {
                error_type: record.error_type.clone(),
                error_message: record.error_message.clone(),
                stack_trace: record.context.stack_trace.clone(),
                failure_count: record.context.failure_count,
                action_attempted: record.action.clone(),
            },
            locator_issue: LocatorIssue {
                original_locator: original.clone(),
                original_locator_type: original_kind,
                failed_reason: analysis::failure_reason(&record.error_message),
                suggested_locator: suggested.clone(),
                suggested_locator_type: suggested_kind,
                confidence_score: record.confidence,
                alternative_locators: Vec::new(),
            },
            code_context: CodeContext {
                page_url: record.page_url.clone(),
                page_excerpt: record.page_excerpt.clone(),
                browser: record.context.browser.clone(),
                viewport: record.context.viewport.clone(),
            },
            root_cause_analysis: RootCauseAnalysis {
                category: cause,
                description: cause.description().to_string(),
                heuristic: true,
            },
            suggested_fix: SuggestedFix {
                fix_type: "locator_update".to_string(),
                priority: severity,
                code_changes: vec![analysis::code_fix(
                    original,
                    suggested,
                    record.test.test_file.as_deref(),
                )],
                alternative_fixes,
                validation_steps: vec![
                    format!("Update the locator in {location}"),
                    format!("Re-run {test_name} with healing disabled"),
                    "Remove this ledger entry once the fix is merged".to_string(),
                ],
            },
            ai_recommendations: AiRecommendations {
                provider: record.provider.clone(),
                best_practices: analysis::best_practices(original_kind)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                preferred_locator_type: suggested_kind,
            },
            metadata: EventMetadata {
                healer_agent: HEALER_AGENT.to_string(),
                healing_strategy: HEALING_STRATEGY.to_string(),
                auto_fix_eligible,
                requires_human_review: !auto_fix_eligible,
                tags: analysis::tags(original_kind, suggested_kind, cause, &record.action),
            },
        }
    }

    /// Uniqueness key
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (
            &self.test_info.test_name,
            &self.locator_issue.original_locator,
        )
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New key appended
    Inserted,
    /// Existing entry replaced
    Replaced,
}

/// File-backed ledger.
#[derive(Debug)]
pub struct HealingLedger {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl HealingLedger {
    /// Open the ledger at `path`, creating an empty array file if absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file or its parent directory cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> HealResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let ledger = Self {
            path,
            write_guard: Mutex::new(()),
        };
        ledger.exclusive(|| {
            // Only the opener that creates the file seeds it; never truncate.
            match OpenOptions::new().write(true).create_new(true).open(&ledger.path) {
                Ok(mut file) => {
                    file.write_all(b"[]")?;
                    debug!(path = %ledger.path.display(), "created ledger");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(ledger)
    }

    /// Ledger file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Raw entries. Unreadable or corrupt content reads as empty.
    #[must_use]
    pub fn load(&self) -> Vec<Value> {
        read_entries(&self.path)
    }

    /// Entries that parse as [`HealingEvent`]; others are skipped.
    #[must_use]
    pub fn entries(&self) -> Vec<HealingEvent> {
        self.load()
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(error = %e, "skipping unrecognised ledger entry");
                    None
                }
            })
            .collect()
    }

    /// Entry with the given id
    #[must_use]
    pub fn find(&self, id: &str) -> Option<HealingEvent> {
        self.entries().into_iter().find(|e| e.id == id)
    }

    /// Insert `event`, or replace the entry with the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken or the file cannot be
    /// rewritten.
    pub fn upsert(&self, event: &HealingEvent) -> HealResult<UpsertOutcome> {
        self.exclusive(|| {
            let (test_name, original) = event.key();
            let mut entries = read_entries(&self.path);
            let value = serde_json::to_value(event)?;
            let outcome = match entries.iter().position(|e| has_key(e, test_name, original)) {
                Some(index) => {
                    entries[index] = value;
                    UpsertOutcome::Replaced
                }
                None => {
                    entries.push(value);
                    UpsertOutcome::Inserted
                }
            };

            fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
            Ok(outcome)
        })
    }

    /// Run `f` holding the in-process guard and the `.lock` file lock.
    fn exclusive<T>(&self, f: impl FnOnce() -> HealResult<T>) -> HealResult<T> {
        let _local = self
            .write_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock.write().map_err(|e| HealError::LedgerLock {
            message: e.to_string(),
        })?;
        f()
    }

    /// [`upsert`](Self::upsert) that logs failures instead of returning them
    pub fn record(&self, event: &HealingEvent) -> Option<UpsertOutcome> {
        match self.upsert(event) {
            Ok(outcome) => {
                info!(id = %event.id, outcome = ?outcome, path = %self.path.display(), "ledger entry written");
                Some(outcome)
            }
            Err(e) => {
                warn!(id = %event.id, error = %e, path = %self.path.display(), "failed to write ledger entry");
                None
            }
        }
    }
}

fn read_entries(path: &Path) -> Vec<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
            return Vec::new();
        }
    };
    if text.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ledger corrupt, starting empty");
        Vec::new()
    })
}

/// Matches both the nested layout and the older flat one
/// (`test_name`/`original_locator` at the top level).
fn has_key(entry: &Value, test_name: &str, original: &str) -> bool {
    let field = |nested: &str, flat: &str| {
        entry
            .pointer(nested)
            .or_else(|| entry.get(flat))
            .and_then(Value::as_str)
    };
    field("/test_info/test_name", "test_name") == Some(test_name)
        && field("/locator_issue/original_locator", "original_locator") == Some(original)
}
