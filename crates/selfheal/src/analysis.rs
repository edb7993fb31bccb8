//! Ledger annotations derived from locator and error text.
//!
//! Every function here is pure string pattern matching. The results are
//! best-effort hints for a reviewer (or an automated code-fix tool), not a
//! verified diagnosis.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Structural kind of a locator descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// `#id`
    Id,
    /// `.class` or `tag.class`
    Class,
    /// `[attr=value]`
    Attribute,
    /// XPath expression
    Xpath,
    /// `get_by_role`
    Role,
    /// `get_by_label`
    Label,
    /// `get_by_placeholder`
    Placeholder,
    /// Text-based: `get_by_text`, `get_by_alt_text`, `get_by_title`, `:has-text`
    Text,
    /// `get_by_test_id` or a `data-testid` attribute
    TestId,
    /// Anything else (tag names, combinators)
    Generic,
}

impl LocatorKind {
    /// Snake-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Class => "class",
            Self::Attribute => "attribute",
            Self::Xpath => "xpath",
            Self::Role => "role",
            Self::Label => "label",
            Self::Placeholder => "placeholder",
            Self::Text => "text",
            Self::TestId => "test_id",
            Self::Generic => "generic",
        }
    }

    /// Whether this kind comes from a semantic query method
    #[must_use]
    pub const fn is_semantic(self) -> bool {
        matches!(
            self,
            Self::Role | Self::Label | Self::Placeholder | Self::Text | Self::TestId
        )
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Likely reason the original locator stopped matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    /// Element kept its shape but its id changed
    IdChanged,
    /// Class names changed
    ClassChanged,
    /// An attribute or test id changed
    AttributeChanged,
    /// Accessible name, label or visible text changed
    TextChanged,
    /// The element moved or the surrounding markup was rebuilt
    DomRestructured,
    /// No pattern matched
    Unknown,
}

impl RootCause {
    /// Snake-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdChanged => "id_changed",
            Self::ClassChanged => "class_changed",
            Self::AttributeChanged => "attribute_changed",
            Self::TextChanged => "text_changed",
            Self::DomRestructured => "dom_restructured",
            Self::Unknown => "unknown",
        }
    }

    /// One-sentence explanation for the report
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::IdChanged => "The element's id attribute was renamed.",
            Self::ClassChanged => "The element's class names were changed.",
            Self::AttributeChanged => "An attribute used to select the element was changed.",
            Self::TextChanged => {
                "The element's accessible name, label or visible text was changed."
            }
            Self::DomRestructured => {
                "The element moved or its surrounding markup was restructured."
            }
            Self::Unknown => "The locator no longer matches; the cause could not be inferred.",
        }
    }

    /// Whether a straight locator swap is a reasonable fix
    #[must_use]
    pub const fn is_simple_rename(self) -> bool {
        matches!(
            self,
            Self::IdChanged | Self::ClassChanged | Self::AttributeChanged | Self::TextChanged
        )
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic drift
    Medium,
    /// Identifier drift that will recur
    High,
    /// Structural change; review before trusting the heal
    Critical,
}

impl Severity {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One proposed source edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    /// File to edit, when known
    pub file: Option<String>,
    /// Text to find
    pub old_code: String,
    /// Replacement
    pub new_code: String,
    /// What the edit does
    pub description: String,
}

/// Stable ledger id: `HEAL-` and 8 uppercase hex digits of
/// SHA-256(`test_name` NUL `original_locator`).
#[must_use]
pub fn event_id(test_name: &str, original_locator: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(test_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(original_locator.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..4].iter().map(|b| format!("{b:02X}")).collect();
    format!("HEAL-{hex}")
}

/// Classify a descriptor by its last chained segment.
#[must_use]
pub fn classify_locator(locator: &str) -> LocatorKind {
    let segment = last_segment(locator.trim());

    if segment.starts_with("//")
        || segment.starts_with("(//")
        || segment.starts_with("xpath=")
        || segment.starts_with("./")
    {
        return LocatorKind::Xpath;
    }
    let semantic = [
        ("get_by_role(", LocatorKind::Role),
        ("get_by_label(", LocatorKind::Label),
        ("get_by_placeholder(", LocatorKind::Placeholder),
        ("get_by_test_id(", LocatorKind::TestId),
        ("get_by_text(", LocatorKind::Text),
        ("get_by_alt_text(", LocatorKind::Text),
        ("get_by_title(", LocatorKind::Text),
    ];
    if let Some((_, kind)) = semantic.iter().find(|(method, _)| segment.contains(method)) {
        return *kind;
    }
    if segment.contains("data-testid") {
        return LocatorKind::TestId;
    }
    if segment.contains(":has-text(") || segment.contains(":text(") || segment.starts_with("text=") {
        return LocatorKind::Text;
    }
    if segment.starts_with('#') {
        return LocatorKind::Id;
    }
    if segment.contains('[') {
        return LocatorKind::Attribute;
    }
    if class_pattern().is_some_and(|re| re.is_match(segment)) {
        return LocatorKind::Class;
    }
    LocatorKind::Generic
}

fn class_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]*\.[A-Za-z_-][\w-]*").ok())
        .as_ref()
}

fn last_segment(locator: &str) -> &str {
    let segment = locator.rsplit(" >> ").next().unwrap_or(locator);
    // `D.first()` and friends narrow a collection without changing its kind
    let mut segment = segment;
    for suffix in [".first()", ".last()"] {
        segment = segment.strip_suffix(suffix).unwrap_or(segment);
    }
    segment.trim()
}

/// Short human description of the failure.
#[must_use]
pub fn failure_reason(error_message: &str) -> String {
    static TIMEOUT: OnceLock<Option<Regex>> = OnceLock::new();
    let lower = error_message.to_lowercase();

    if lower.contains("timeout") {
        let ms = TIMEOUT
            .get_or_init(|| Regex::new(r"(?i)timeout (\d+)ms").ok())
            .as_ref()
            .and_then(|re| re.captures(error_message))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        return match ms {
            Some(ms) => format!("Element not found within {ms}ms timeout"),
            None => "Element not found within timeout".to_string(),
        };
    }
    if lower.contains("strict mode violation") || lower.contains("resolved to") {
        return "Locator matched more than one element".to_string();
    }
    if lower.contains("detached") {
        return "Element was detached from the DOM".to_string();
    }
    if lower.contains("not visible") || lower.contains("hidden") {
        return "Element was present but not visible".to_string();
    }
    if lower.contains("not enabled") || lower.contains("disabled") {
        return "Element was disabled".to_string();
    }
    "Locator could not be resolved".to_string()
}

/// Guess why `original` stopped matching given that `suggested` did.
#[must_use]
pub fn root_cause(original: &str, suggested: &str) -> RootCause {
    let before = classify_locator(original);
    let after = classify_locator(suggested);

    if after == LocatorKind::Xpath && before != LocatorKind::Xpath {
        return RootCause::DomRestructured;
    }
    if before.is_semantic() && before != LocatorKind::TestId {
        return RootCause::TextChanged;
    }
    match (before, after) {
        (LocatorKind::Id, LocatorKind::Id) => RootCause::IdChanged,
        (LocatorKind::Class, LocatorKind::Class) => RootCause::ClassChanged,
        (
            LocatorKind::Attribute | LocatorKind::TestId,
            LocatorKind::Attribute | LocatorKind::TestId | LocatorKind::Id,
        ) => RootCause::AttributeChanged,
        (LocatorKind::Xpath, _) | (LocatorKind::Generic, _) => RootCause::DomRestructured,
        (a, b) if a != b => RootCause::DomRestructured,
        _ => RootCause::Unknown,
    }
}

/// Severity for a root cause
#[must_use]
pub const fn severity(cause: RootCause) -> Severity {
    match cause {
        RootCause::DomRestructured => Severity::Critical,
        RootCause::IdChanged | RootCause::AttributeChanged => Severity::High,
        RootCause::ClassChanged | RootCause::TextChanged | RootCause::Unknown => {
            Severity::Medium
        }
    }
}

/// The source edit replacing `original` with `suggested`.
///
/// Raw selectors are rendered as `locator("...")` calls; semantic
/// descriptors are matched as written.
#[must_use]
pub fn code_fix(original: &str, suggested: &str, file: Option<&str>) -> CodeChange {
    let old_code = if classify_locator(original).is_semantic() {
        original.to_string()
    } else {
        format!("locator({original:?})")
    };
    CodeChange {
        file: file.map(str::to_string),
        old_code,
        new_code: format!("locator({suggested:?})"),
        description: format!("Replace the failing locator `{original}` with `{suggested}`"),
    }
}

/// Guidance for writing a sturdier locator of `kind`
#[must_use]
pub fn best_practices(kind: LocatorKind) -> Vec<&'static str> {
    let specific: &[&str] = match kind {
        LocatorKind::Id => &[
            "Ids are often generated or renamed; prefer a data-testid attribute",
            "If the id is stable by contract, document it next to the markup",
        ],
        LocatorKind::Class => &[
            "Class names change with styling; avoid selecting by presentation",
            "Prefer role or test id queries for interactive elements",
        ],
        LocatorKind::Attribute => &[
            "Select on attributes that carry meaning, not on generated values",
            "Use partial matches (*=) only for stable prefixes",
        ],
        LocatorKind::Xpath => &[
            "XPath tied to document structure breaks when layout changes",
            "Replace positional XPath with a role, label or test id query",
        ],
        LocatorKind::Role | LocatorKind::Label | LocatorKind::Placeholder => &[
            "Semantic queries break when copy changes; keep names in shared constants",
            "Use exact matching only when the text is fixed",
        ],
        LocatorKind::Text => &[
            "Visible text changes with copy edits and translations",
            "Combine text with a role to narrow the match",
        ],
        LocatorKind::TestId => &["Keep test ids in sync between markup and tests"],
        LocatorKind::Generic => &["Tag-only selectors match too broadly; add a role or test id"],
    };
    let mut practices = specific.to_vec();
    practices.push("Re-run the test without healing after updating the locator");
    practices
}

/// Filter tags for a ledger entry.
#[must_use]
pub fn tags(original: LocatorKind, suggested: LocatorKind, cause: RootCause, action: &str) -> Vec<String> {
    let mut tags = vec![
        "self-healed".to_string(),
        format!("locator:{original}"),
        format!("suggested:{suggested}"),
        format!("root-cause:{cause}"),
        format!("action:{action}"),
    ];
    if suggested == LocatorKind::Xpath {
        tags.push("xpath-fallback".to_string());
    }
    if original != suggested {
        tags.push("kind-changed".to_string());
    }
    tags
}
