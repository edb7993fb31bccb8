//! Healing orchestrator: failed locator in, replacement suggestion out.
//!
//! The healer builds one fixed prompt, hands it to the configured
//! [`TextGenerator`] and validates what comes back. It never returns an
//! error; every way generation can go wrong is a [`Suggestion::Unavailable`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SNAPSHOT_LIMIT;
use crate::provider::{ProviderSource, TextGenerator};
use crate::result::HealResult;

/// Sentinel the model returns when no element on the page could be the target
pub const ELEMENT_MISSING: &str = "ELEMENT_MISSING";

/// One healing attempt's inputs. Built per failure, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealingRequest {
    /// Page markup at the time of failure
    pub page_snapshot: String,
    /// Descriptor of the locator that failed
    pub failed_locator: String,
    /// Action that was attempted
    pub action: String,
    /// Engine error text
    pub error: String,
}

impl HealingRequest {
    /// Create a request
    pub fn new(
        page_snapshot: impl Into<String>,
        failed_locator: impl Into<String>,
        action: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            page_snapshot: page_snapshot.into(),
            failed_locator: failed_locator.into(),
            action: action.into(),
            error: error.into(),
        }
    }
}

/// Why a response could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// The provider returned nothing (transport, auth or decoding failure)
    NoResponse,
    /// The response was blank after cleanup
    Empty,
    /// The response called a query method instead of giving a selector
    SemanticQuery(String),
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => f.write_str("provider returned no response"),
            Self::Empty => f.write_str("provider returned an empty locator"),
            Self::SemanticQuery(text) => write!(f, "provider returned a query call: {text}"),
        }
    }
}

/// The healer's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    /// A raw selector to retry with
    Candidate(String),
    /// The model asserts no element could be the target
    ElementMissing,
    /// No usable answer
    Unavailable(GenerationFailure),
}

impl Suggestion {
    /// The candidate selector, if this suggestion is usable
    #[must_use]
    pub fn candidate(&self) -> Option<&str> {
        match self {
            Self::Candidate(locator) => Some(locator),
            Self::ElementMissing | Self::Unavailable(_) => None,
        }
    }
}

/// Turns healing requests into suggestions.
#[derive(Clone)]
pub struct Healer {
    generator: Arc<dyn TextGenerator>,
    snapshot_limit: usize,
}

impl fmt::Debug for Healer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Healer")
            .field("provider", &self.generator.name())
            .field("snapshot_limit", &self.snapshot_limit)
            .finish()
    }
}

impl Healer {
    /// Create a healer from a provider name/config or a ready generator.
    ///
    /// # Errors
    ///
    /// Returns the configuration error from [`ProviderSource::into_generator`].
    pub fn new(source: impl Into<ProviderSource>) -> HealResult<Self> {
        Ok(Self::from_generator(source.into().into_generator()?))
    }

    /// Create a healer around an existing generator
    #[must_use]
    pub fn from_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }

    /// Cap the snapshot characters included in each prompt
    #[must_use]
    pub const fn with_snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    /// Name of the underlying provider
    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.generator.name()
    }

    /// Render the prompt for `request`
    #[must_use]
    pub fn build_prompt(&self, request: &HealingRequest) -> String {
        let snapshot = truncate_chars(&request.page_snapshot, self.snapshot_limit);
        format!(
            r##"You are a test automation expert. A browser UI test failed because an element was not found.

Original locator: `{locator}`
Action attempted: `{action}`
Error message: `{error}`

Here is the HTML content of the page (truncated if too large):
```html
{snapshot}
```

Analyze the HTML and suggest a NEW locator that finds the intended element.

CRITICAL RULES:
1. Return ONLY a CSS selector or XPath expression
2. DO NOT return query method calls such as "get_by_text()" or "get_by_role()"
3. Look for elements with similar IDs, classes or text content
4. If the ID changed (e.g. 'submit-btn' -> 'continue-btn'), return the new ID selector such as "#continue-btn"
5. To match by text, use CSS such as a:has-text("More information") or a[href*="domain"]
6. Return "{missing}" only if no interactive element on the page could be the target

EXAMPLES OF VALID RESPONSES:
- #continue-btn
- button.submit
- a[href="https://iana.org/domains/example"]
- //button[contains(text(), 'Submit')]

EXAMPLES OF INVALID RESPONSES (DO NOT USE):
- get_by_text('Learn more')
- get_by_role('button', name='Submit')
- page.locator('#btn')

Return ONLY the CSS selector or XPath. No explanations, no code, no markdown."##,
            locator = request.failed_locator,
            action = request.action,
            error = request.error,
            missing = ELEMENT_MISSING,
        )
    }

    /// Ask the provider for a replacement locator.
    pub async fn heal(&self, request: &HealingRequest) -> Suggestion {
        let prompt = self.build_prompt(request);
        debug!(
            provider = self.provider_name(),
            prompt_chars = prompt.chars().count(),
            "requesting locator suggestion"
        );

        let response = self.generator.generate(&prompt).await;
        let suggestion = interpret_response(response.as_deref());
        match &suggestion {
            Suggestion::Candidate(locator) => {
                info!(failed = %request.failed_locator, suggested = %locator, "provider suggested locator");
            }
            Suggestion::ElementMissing => {
                info!(failed = %request.failed_locator, "provider reports element missing");
            }
            Suggestion::Unavailable(GenerationFailure::SemanticQuery(text)) => {
                warn!(response = %text, "provider returned a query call instead of a selector");
            }
            Suggestion::Unavailable(reason) => {
                warn!(reason = %reason, "no usable suggestion");
            }
        }
        suggestion
    }
}

/// Clean and validate a raw provider response.
///
/// Trims whitespace, strips one pair of enclosing backticks, rejects
/// anything that calls a query method, and passes [`ELEMENT_MISSING`]
/// through as [`Suggestion::ElementMissing`].
#[must_use]
pub fn interpret_response(response: Option<&str>) -> Suggestion {
    let Some(raw) = response else {
        return Suggestion::Unavailable(GenerationFailure::NoResponse);
    };

    let mut locator = raw.trim();
    if locator.starts_with('`') && locator.ends_with('`') {
        // A lone backtick counts as both ends.
        let inner = locator.strip_prefix('`').unwrap_or(locator);
        locator = inner.strip_suffix('`').unwrap_or(inner).trim();
    }

    if locator.is_empty() {
        return Suggestion::Unavailable(GenerationFailure::Empty);
    }
    if looks_like_semantic_query(locator) {
        return Suggestion::Unavailable(GenerationFailure::SemanticQuery(locator.to_string()));
    }
    if locator == ELEMENT_MISSING {
        return Suggestion::ElementMissing;
    }
    Suggestion::Candidate(locator.to_string())
}

/// Whether `text` contains a query method call rather than a plain selector
#[must_use]
pub fn looks_like_semantic_query(text: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"get_by_|getBy[A-Z]\w*\s*\(|locator\s*\(").ok());
    match pattern {
        Some(re) => re.is_match(text),
        None => text.contains("get_by_") || text.contains("locator("),
    }
}

/// Longest prefix of `text` with at most `max_chars` characters
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
