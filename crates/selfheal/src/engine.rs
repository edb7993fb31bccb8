//! Browser engine capability.
//!
//! The healing layer never talks to a browser directly. It needs an engine
//! that can resolve a locator description, perform one named action on it,
//! report the page markup and construct a raw locator from a plain string.
//! Everything the proxy can do is listed in [`Action`]; nothing is forwarded
//! by name at runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::EngineError;

/// Every action name that yields a sub-locator rather than a value
pub const CHAINING_ACTIONS: &[&str] = &[
    "locator",
    "filter",
    "and",
    "or",
    "first",
    "last",
    "nth",
    "get_by_role",
    "get_by_label",
    "get_by_placeholder",
    "get_by_text",
    "get_by_alt_text",
    "get_by_title",
    "get_by_test_id",
];

/// Semantic query methods. A healing suggestion must never call one of these.
pub const SEMANTIC_QUERY_METHODS: &[&str] = &[
    "get_by_role",
    "get_by_label",
    "get_by_placeholder",
    "get_by_text",
    "get_by_alt_text",
    "get_by_title",
    "get_by_test_id",
];

/// How an element is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector or XPath expression, passed to the engine as-is
    Raw(String),
    /// ARIA role with optional accessible name
    Role {
        /// Role, e.g. `button`
        role: String,
        /// Accessible name
        name: Option<String>,
        /// Match the name exactly
        exact: bool,
    },
    /// Associated `<label>` text
    Label {
        /// Label text
        text: String,
        /// Exact match
        exact: bool,
    },
    /// Input placeholder
    Placeholder {
        /// Placeholder text
        text: String,
        /// Exact match
        exact: bool,
    },
    /// Visible text content
    Text {
        /// Text
        text: String,
        /// Exact match
        exact: bool,
    },
    /// Image alt text
    AltText {
        /// Alt text
        text: String,
        /// Exact match
        exact: bool,
    },
    /// `title` attribute
    Title {
        /// Title text
        text: String,
        /// Exact match
        exact: bool,
    },
    /// `data-testid` attribute
    TestId(String),
}

impl Selector {
    /// Create a raw selector
    #[must_use]
    pub fn raw(selector: impl Into<String>) -> Self {
        Self::Raw(selector.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
            exact: false,
        }
    }

    /// Create a label selector
    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self::Label {
            text: text.into(),
            exact: false,
        }
    }

    /// Create a placeholder selector
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder {
            text: text.into(),
            exact: false,
        }
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Create an alt text selector
    #[must_use]
    pub fn alt_text(text: impl Into<String>) -> Self {
        Self::AltText {
            text: text.into(),
            exact: false,
        }
    }

    /// Create a title selector
    #[must_use]
    pub fn title(text: impl Into<String>) -> Self {
        Self::Title {
            text: text.into(),
            exact: false,
        }
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Set the accessible name (role selectors only)
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        if let Self::Role { name, .. } = &mut self {
            *name = Some(value.into());
        }
        self
    }

    /// Require an exact match (ignored for raw and test ID selectors)
    #[must_use]
    pub fn exact(mut self) -> Self {
        match &mut self {
            Self::Role { exact, .. }
            | Self::Label { exact, .. }
            | Self::Placeholder { exact, .. }
            | Self::Text { exact, .. }
            | Self::AltText { exact, .. }
            | Self::Title { exact, .. } => *exact = true,
            Self::Raw(_) | Self::TestId(_) => {}
        }
        self
    }

    /// Query method this selector corresponds to
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::Raw(_) => "locator",
            Self::Role { .. } => "get_by_role",
            Self::Label { .. } => "get_by_label",
            Self::Placeholder { .. } => "get_by_placeholder",
            Self::Text { .. } => "get_by_text",
            Self::AltText { .. } => "get_by_alt_text",
            Self::Title { .. } => "get_by_title",
            Self::TestId(_) => "get_by_test_id",
        }
    }

    /// Whether this is one of the semantic query kinds
    #[must_use]
    pub const fn is_semantic(&self) -> bool {
        !matches!(self, Self::Raw(_))
    }

    /// Human-readable rendering, e.g. `get_by_role('button', name='Submit')`.
    ///
    /// Raw selectors render as themselves.
    #[must_use]
    pub fn describe(&self) -> String {
        let method = self.method_name();
        match self {
            Self::Raw(selector) => selector.clone(),
            Self::Role { role, name, exact } => {
                let mut args = quote(role);
                if let Some(name) = name {
                    args.push_str(&format!(", name={}", quote(name)));
                }
                if *exact {
                    args.push_str(", exact=True");
                }
                format!("{method}({args})")
            }
            Self::Label { text, exact }
            | Self::Placeholder { text, exact }
            | Self::Text { text, exact }
            | Self::AltText { text, exact }
            | Self::Title { text, exact } => {
                if *exact {
                    format!("{method}({}, exact=True)", quote(text))
                } else {
                    format!("{method}({})", quote(text))
                }
            }
            Self::TestId(id) => format!("{method}({})", quote(id)),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Options for narrowing a collection by text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Keep elements containing this text
    pub has_text: Option<String>,
    /// Drop elements containing this text
    pub has_not_text: Option<String>,
}

impl FilterOptions {
    /// Keep elements containing `text`
    #[must_use]
    pub fn has_text(text: impl Into<String>) -> Self {
        Self {
            has_text: Some(text.into()),
            has_not_text: None,
        }
    }

    /// Drop elements containing `text`
    #[must_use]
    pub fn has_not_text(text: impl Into<String>) -> Self {
        Self {
            has_text: None,
            has_not_text: Some(text.into()),
        }
    }

    /// Render as call arguments, e.g. `has_text='Save'`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(text) = &self.has_text {
            parts.push(format!("has_text={}", quote(text)));
        }
        if let Some(text) = &self.has_not_text {
            parts.push(format!("has_not_text={}", quote(text)));
        }
        parts.join(", ")
    }
}

/// One operation on a resolved locator.
///
/// `L` is the engine's locator type; it appears in the boolean combinators,
/// which take a second locator.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<L> {
    /// Click
    Click,
    /// Double click
    DblClick,
    /// Replace the input value
    Fill(String),
    /// Press a key or chord, e.g. `Enter`
    Press(String),
    /// Type text one key at a time
    PressSequentially(String),
    /// Check a checkbox or radio
    Check,
    /// Uncheck a checkbox
    Uncheck,
    /// Hover
    Hover,
    /// Focus
    Focus,
    /// Clear the input value
    Clear,
    /// Select options by value or label
    SelectOption(Vec<String>),
    /// Scroll the element into view
    ScrollIntoView,
    /// `textContent`
    TextContent,
    /// Rendered text
    InnerText,
    /// Inner markup
    InnerHtml,
    /// Current input value
    InputValue,
    /// Attribute value
    GetAttribute(String),
    /// Visibility check (does not wait)
    IsVisible,
    /// Hidden check (does not wait)
    IsHidden,
    /// Enabled check
    IsEnabled,
    /// Checked state
    IsChecked,
    /// Number of matches (does not wait)
    Count,
    /// `textContent` of every match
    AllTextContents,
    /// Wait until the element is attached and visible
    WaitFor,
    /// Nested raw query
    Locator(String),
    /// Narrow by text
    Filter(FilterOptions),
    /// Elements matching both locators
    And {
        /// Other engine locator
        locator: L,
        /// Descriptor of the other locator
        descriptor: String,
    },
    /// Elements matching either locator
    Or {
        /// Other engine locator
        locator: L,
        /// Descriptor of the other locator
        descriptor: String,
    },
    /// First match
    First,
    /// Last match
    Last,
    /// Match at index (negative counts from the end)
    Nth(i32),
    /// Nested semantic query
    Query(Selector),
}

impl<L> Action<L> {
    /// Action name as used in logs and the ledger
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DblClick => "dblclick",
            Self::Fill(_) => "fill",
            Self::Press(_) => "press",
            Self::PressSequentially(_) => "press_sequentially",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Hover => "hover",
            Self::Focus => "focus",
            Self::Clear => "clear",
            Self::SelectOption(_) => "select_option",
            Self::ScrollIntoView => "scroll_into_view",
            Self::TextContent => "text_content",
            Self::InnerText => "inner_text",
            Self::InnerHtml => "inner_html",
            Self::InputValue => "input_value",
            Self::GetAttribute(_) => "get_attribute",
            Self::IsVisible => "is_visible",
            Self::IsHidden => "is_hidden",
            Self::IsEnabled => "is_enabled",
            Self::IsChecked => "is_checked",
            Self::Count => "count",
            Self::AllTextContents => "all_text_contents",
            Self::WaitFor => "wait_for",
            Self::Locator(_) => "locator",
            Self::Filter(_) => "filter",
            Self::And { .. } => "and",
            Self::Or { .. } => "or",
            Self::First => "first",
            Self::Last => "last",
            Self::Nth(_) => "nth",
            Self::Query(selector) => selector.method_name(),
        }
    }

    /// Whether a successful result is a new sub-locator
    #[must_use]
    pub const fn is_chaining(&self) -> bool {
        matches!(
            self,
            Self::Locator(_)
                | Self::Filter(_)
                | Self::And { .. }
                | Self::Or { .. }
                | Self::First
                | Self::Last
                | Self::Nth(_)
                | Self::Query(_)
        )
    }

    /// Text appended to the parent descriptor for a chaining action.
    ///
    /// Returns `None` for actions that yield values.
    #[must_use]
    pub fn chain_suffix(&self) -> Option<String> {
        let suffix = match self {
            Self::Locator(selector) => format!(" >> {selector}"),
            Self::Filter(options) => format!(".filter({})", options.describe()),
            Self::And { descriptor, .. } => format!(".and({descriptor})"),
            Self::Or { descriptor, .. } => format!(".or({descriptor})"),
            Self::First => ".first()".to_string(),
            Self::Last => ".last()".to_string(),
            Self::Nth(index) => format!(".nth({index})"),
            Self::Query(Selector::Raw(selector)) => format!(" >> {selector}"),
            Self::Query(selector) => format!(".{}", selector.describe()),
            _ => return None,
        };
        Some(suffix)
    }
}

/// Result of a successful action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput<L> {
    /// Action completed with no value
    Done,
    /// Boolean state
    Flag(bool),
    /// Single text value (`None` when the engine reports null)
    Text(Option<String>),
    /// List of text values
    Texts(Vec<String>),
    /// Match count
    Count(usize),
    /// Sub-locator from a chaining action
    Locator(L),
}

impl<L> ActionOutput<L> {
    /// Transform the locator payload, leaving other variants untouched
    pub fn map_locator<M, F>(self, f: F) -> ActionOutput<M>
    where
        F: FnOnce(L) -> M,
    {
        match self {
            Self::Done => ActionOutput::Done,
            Self::Flag(b) => ActionOutput::Flag(b),
            Self::Text(t) => ActionOutput::Text(t),
            Self::Texts(t) => ActionOutput::Texts(t),
            Self::Count(n) => ActionOutput::Count(n),
            Self::Locator(l) => ActionOutput::Locator(f(l)),
        }
    }

    /// `Some(())` for [`ActionOutput::Done`]
    pub fn into_done(self) -> Option<()> {
        matches!(self, Self::Done).then_some(())
    }

    /// Boolean payload
    pub fn into_flag(self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(b),
            _ => None,
        }
    }

    /// Text payload
    pub fn into_text(self) -> Option<Option<String>> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// List payload
    pub fn into_texts(self) -> Option<Vec<String>> {
        match self {
            Self::Texts(t) => Some(t),
            _ => None,
        }
    }

    /// Count payload
    pub fn into_count(self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(n),
            _ => None,
        }
    }

    /// Locator payload
    pub fn into_locator(self) -> Option<L> {
        match self {
            Self::Locator(l) => Some(l),
            _ => None,
        }
    }
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Execution environment reported with each heal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineEnvironment {
    /// Browser kind, e.g. `chromium`
    pub browser: Option<String>,
    /// Viewport, if the page has a fixed one
    pub viewport: Option<Viewport>,
}

/// The browser capability the healing proxy drives.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Engine-side resolved locator
    type Locator: Clone + Send + Sync + fmt::Debug;

    /// Resolve a page-level query. Lazy; performs no I/O.
    fn query(&self, selector: &Selector) -> Self::Locator;

    /// Construct a raw locator from a plain selector string
    fn locator(&self, selector: &str) -> Self::Locator {
        self.query(&Selector::raw(selector))
    }

    /// Perform one action.
    ///
    /// # Errors
    ///
    /// [`EngineError::Timeout`] if the locator did not resolve before the
    /// engine's deadline, any other variant for failures healing cannot fix.
    async fn perform(
        &self,
        locator: &Self::Locator,
        action: &Action<Self::Locator>,
    ) -> Result<ActionOutput<Self::Locator>, EngineError>;

    /// Current page markup
    async fn content(&self) -> Result<String, EngineError>;

    /// Navigate to `url`
    async fn goto(&self, url: &str) -> Result<(), EngineError>;

    /// Current page URL
    fn url(&self) -> String;

    /// Browser kind and viewport
    fn environment(&self) -> EngineEnvironment {
        EngineEnvironment::default()
    }
}

// ============================================================================
// Mock engine
// ============================================================================

/// Locator handed out by [`MockEngine`]: the key the element is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockLocator {
    /// Lookup key
    pub key: String,
}

/// Element state in a [`MockEngine`] page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Text content
    pub text: String,
    /// Input value
    pub value: String,
    /// Visible
    pub visible: bool,
    /// Enabled
    pub enabled: bool,
    /// Checked
    pub checked: bool,
    /// Attributes
    pub attributes: HashMap<String, String>,
}

impl Default for MockElement {
    fn default() -> Self {
        Self {
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            checked: false,
            attributes: HashMap::new(),
        }
    }
}

impl MockElement {
    /// Visible, enabled element with no text
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Mark disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Mark hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, Default)]
struct MockPage {
    url: String,
    content: Option<String>,
    elements: HashMap<String, MockElement>,
    failures: HashMap<String, EngineError>,
    call_history: Vec<String>,
}

/// In-memory engine for tests.
///
/// Elements are stored under the exact key a locator resolves to: raw
/// selectors under themselves, semantic queries under their
/// [`Selector::describe`] text, and nested queries as `parent >> child`.
/// Collection narrowing (`first`, `nth`, `filter`, ...) keeps the parent key.
/// Actions on a key with no element time out like a real engine would.
#[derive(Debug)]
pub struct MockEngine {
    page: Mutex<MockPage>,
    environment: EngineEnvironment,
    timeout_ms: u64,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            page: Mutex::new(MockPage {
                url: "about:blank".to_string(),
                ..MockPage::default()
            }),
            environment: EngineEnvironment {
                browser: Some("mock".to_string()),
                viewport: Some(Viewport {
                    width: 1280,
                    height: 720,
                }),
            },
            timeout_ms: 5000,
        }
    }
}

impl MockEngine {
    /// Create an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element under `key`
    #[must_use]
    pub fn with_element(self, key: impl Into<String>, element: MockElement) -> Self {
        self.lock().elements.insert(key.into(), element);
        self
    }

    /// Set the markup returned by `content()`
    #[must_use]
    pub fn with_content(self, html: impl Into<String>) -> Self {
        self.lock().content = Some(html.into());
        self
    }

    /// Make every action on `key` fail with `error`
    #[must_use]
    pub fn with_failure(self, key: impl Into<String>, error: EngineError) -> Self {
        self.lock().failures.insert(key.into(), error);
        self
    }

    /// Set the reported environment
    #[must_use]
    pub fn with_environment(mut self, environment: EngineEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Remove the element under `key`
    pub fn remove_element(&self, key: &str) -> Option<MockElement> {
        self.lock().elements.remove(key)
    }

    /// Current state of the element under `key`
    #[must_use]
    pub fn element(&self, key: &str) -> Option<MockElement> {
        self.lock().elements.get(key).cloned()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.lock().call_history.iter().any(|c| c.starts_with(method))
    }

    fn lock(&self) -> MutexGuard<'_, MockPage> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timeout(&self, action: &str, key: &str) -> EngineError {
        EngineError::timeout(format!(
            "Locator.{action}: Timeout {}ms exceeded.\nCall log:\n  - waiting for locator('{key}')",
            self.timeout_ms
        ))
    }

    fn chain(parent: &MockLocator, action: &Action<MockLocator>) -> MockLocator {
        let key = match action {
            Action::Locator(selector) | Action::Query(Selector::Raw(selector)) => {
                format!("{} >> {selector}", parent.key)
            }
            Action::Query(selector) => format!("{} >> {}", parent.key, selector.describe()),
            _ => parent.key.clone(),
        };
        MockLocator { key }
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    type Locator = MockLocator;

    fn query(&self, selector: &Selector) -> MockLocator {
        MockLocator {
            key: selector.describe(),
        }
    }

    async fn perform(
        &self,
        locator: &MockLocator,
        action: &Action<MockLocator>,
    ) -> Result<ActionOutput<MockLocator>, EngineError> {
        let name = action.name();
        let mut page = self.lock();
        page.call_history.push(format!("{name}:{}", locator.key));

        if action.is_chaining() {
            return Ok(ActionOutput::Locator(Self::chain(locator, action)));
        }
        if let Some(error) = page.failures.get(&locator.key) {
            return Err(error.clone());
        }

        // Queries that never wait
        let present = page.elements.get(&locator.key);
        match action {
            Action::IsVisible => return Ok(ActionOutput::Flag(present.is_some_and(|e| e.visible))),
            Action::IsHidden => return Ok(ActionOutput::Flag(!present.is_some_and(|e| e.visible))),
            Action::Count => return Ok(ActionOutput::Count(usize::from(present.is_some()))),
            Action::AllTextContents => {
                return Ok(ActionOutput::Texts(
                    present.map(|e| vec![e.text.clone()]).unwrap_or_default(),
                ))
            }
            _ => {}
        }

        let Some(element) = page.elements.get_mut(&locator.key) else {
            return Err(self.timeout(name, &locator.key));
        };
        let needs_enabled = matches!(
            action,
            Action::Fill(_)
                | Action::PressSequentially(_)
                | Action::Clear
                | Action::Check
                | Action::Uncheck
                | Action::SelectOption(_)
        );
        if needs_enabled && !element.enabled {
            return Err(EngineError::action(format!(
                "Locator.{name}: element is not enabled"
            )));
        }

        let output = match action {
            Action::Fill(value) => {
                element.value.clone_from(value);
                ActionOutput::Done
            }
            Action::PressSequentially(text) => {
                element.value.push_str(text);
                ActionOutput::Done
            }
            Action::Clear => {
                element.value.clear();
                ActionOutput::Done
            }
            Action::Check => {
                element.checked = true;
                ActionOutput::Done
            }
            Action::Uncheck => {
                element.checked = false;
                ActionOutput::Done
            }
            Action::SelectOption(values) => {
                element.value = values.first().cloned().unwrap_or_default();
                ActionOutput::Done
            }
            Action::TextContent | Action::InnerText | Action::InnerHtml => {
                ActionOutput::Text(Some(element.text.clone()))
            }
            Action::InputValue => ActionOutput::Text(Some(element.value.clone())),
            Action::GetAttribute(attr) => ActionOutput::Text(element.attributes.get(attr).cloned()),
            Action::IsEnabled => ActionOutput::Flag(element.enabled),
            Action::IsChecked => ActionOutput::Flag(element.checked),
            _ => ActionOutput::Done,
        };
        Ok(output)
    }

    async fn content(&self) -> Result<String, EngineError> {
        let mut page = self.lock();
        page.call_history.push("content".to_string());
        if let Some(html) = &page.content {
            return Ok(html.clone());
        }
        let mut keys: Vec<&String> = page.elements.keys().collect();
        keys.sort();
        let body: String = keys
            .into_iter()
            .map(|key| format!("<!-- {key} -->"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("<html><body>\n{body}\n</body></html>"))
    }

    async fn goto(&self, url: &str) -> Result<(), EngineError> {
        let mut page = self.lock();
        page.call_history.push(format!("goto:{url}"));
        page.url = url.to_string();
        Ok(())
    }

    fn url(&self) -> String {
        self.lock().url.clone()
    }

    fn environment(&self) -> EngineEnvironment {
        self.environment.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_describe_role_with_name() {
            let selector = Selector::role("button").name("Submit");
            assert_eq!(selector.describe(), "get_by_role('button', name='Submit')");
        }

        #[test]
        fn test_describe_exact() {
            assert_eq!(
                Selector::text("Learn more").exact().describe(),
                "get_by_text('Learn more', exact=True)"
            );
            assert_eq!(
                Selector::role("link").name("Home").exact().describe(),
                "get_by_role('link', name='Home', exact=True)"
            );
        }

        #[test]
        fn test_describe_escapes_quotes() {
            assert_eq!(
                Selector::label("Driver's licence").describe(),
                "get_by_label('Driver\\'s licence')"
            );
        }

        #[test]
        fn test_raw_renders_as_itself() {
            assert_eq!(Selector::raw("#submit-btn").describe(), "#submit-btn");
            assert!(!Selector::raw("#x").is_semantic());
        }

        #[test]
        fn test_every_semantic_method_is_listed() {
            let selectors = [
                Selector::role("button"),
                Selector::label("Email"),
                Selector::placeholder("Search"),
                Selector::text("Hello"),
                Selector::alt_text("Logo"),
                Selector::title("Help"),
                Selector::test_id("login"),
            ];
            for selector in selectors {
                assert!(SEMANTIC_QUERY_METHODS.contains(&selector.method_name()));
                assert!(selector.describe().starts_with(selector.method_name()));
            }
        }
    }

    mod action_tests {
        use super::*;

        fn all_chaining() -> Vec<Action<MockLocator>> {
            let other = MockLocator { key: "x".into() };
            vec![
                Action::Locator("span".into()),
                Action::Filter(FilterOptions::has_text("Save")),
                Action::And {
                    locator: other.clone(),
                    descriptor: "x".into(),
                },
                Action::Or {
                    locator: other,
                    descriptor: "x".into(),
                },
                Action::First,
                Action::Last,
                Action::Nth(2),
                Action::Query(Selector::role("button")),
                Action::Query(Selector::label("a")),
                Action::Query(Selector::placeholder("a")),
                Action::Query(Selector::text("a")),
                Action::Query(Selector::alt_text("a")),
                Action::Query(Selector::title("a")),
                Action::Query(Selector::test_id("a")),
            ]
        }

        #[test]
        fn test_chaining_set_matches_constant() {
            let names: Vec<&str> = all_chaining().iter().map(Action::name).collect();
            assert_eq!(names, CHAINING_ACTIONS);
            assert!(all_chaining().iter().all(Action::is_chaining));
        }

        #[test]
        fn test_value_actions_do_not_chain() {
            let actions: Vec<Action<MockLocator>> = vec![
                Action::Click,
                Action::Fill("x".into()),
                Action::TextContent,
                Action::Count,
                Action::IsVisible,
                Action::WaitFor,
            ];
            for action in actions {
                assert!(!action.is_chaining(), "{}", action.name());
                assert!(!CHAINING_ACTIONS.contains(&action.name()));
                assert!(action.chain_suffix().is_none());
            }
        }

        #[test]
        fn test_chain_suffixes() {
            let cases: Vec<(Action<MockLocator>, &str)> = vec![
                (Action::Locator("span.label".into()), " >> span.label"),
                (Action::First, ".first()"),
                (Action::Last, ".last()"),
                (Action::Nth(-1), ".nth(-1)"),
                (
                    Action::Filter(FilterOptions::has_text("Save")),
                    ".filter(has_text='Save')",
                ),
                (
                    Action::Or {
                        locator: MockLocator { key: "#b".into() },
                        descriptor: "#b".into(),
                    },
                    ".or(#b)",
                ),
                (
                    Action::Query(Selector::text("Next")),
                    ".get_by_text('Next')",
                ),
            ];
            for (action, expected) in cases {
                assert_eq!(action.chain_suffix().unwrap(), expected);
            }
        }

        #[test]
        fn test_map_locator_leaves_values() {
            let out: ActionOutput<u8> = ActionOutput::Count(3);
            assert_eq!(out.map_locator(u16::from), ActionOutput::Count(3));
            let out: ActionOutput<u8> = ActionOutput::Locator(7);
            assert_eq!(out.map_locator(u16::from), ActionOutput::Locator(7u16));
        }
    }

    mod mock_engine_tests {
        use super::*;

        #[tokio::test]
        async fn test_missing_element_times_out() {
            let engine = MockEngine::new();
            let loc = engine.locator("#nope");
            let err = engine.perform(&loc, &Action::Click).await.unwrap_err();
            assert!(err.is_healable());
            assert!(err.to_string().starts_with("Locator.click: Timeout 5000ms exceeded."));
        }

        #[tokio::test]
        async fn test_fill_then_read_value() {
            let engine = MockEngine::new().with_element("#email", MockElement::new());
            let loc = engine.locator("#email");
            engine
                .perform(&loc, &Action::Fill("a@b.c".into()))
                .await
                .unwrap();
            let value = engine.perform(&loc, &Action::InputValue).await.unwrap();
            assert_eq!(value, ActionOutput::Text(Some("a@b.c".into())));
        }

        #[tokio::test]
        async fn test_disabled_fill_is_not_healable() {
            let engine = MockEngine::new().with_element("#name", MockElement::new().disabled());
            let loc = engine.locator("#name");
            let err = engine
                .perform(&loc, &Action::Fill("x".into()))
                .await
                .unwrap_err();
            assert!(!err.is_healable());
        }

        #[tokio::test]
        async fn test_non_waiting_queries_on_missing_element() {
            let engine = MockEngine::new();
            let loc = engine.locator("#gone");
            assert_eq!(
                engine.perform(&loc, &Action::IsVisible).await.unwrap(),
                ActionOutput::Flag(false)
            );
            assert_eq!(
                engine.perform(&loc, &Action::Count).await.unwrap(),
                ActionOutput::Count(0)
            );
        }

        #[tokio::test]
        async fn test_chained_keys() {
            let engine = MockEngine::new();
            let form = engine.locator("form");
            let out = engine
                .perform(&form, &Action::Query(Selector::role("button")))
                .await
                .unwrap();
            assert_eq!(out.into_locator().unwrap().key, "form >> get_by_role('button')");
            let first = engine.perform(&form, &Action::First).await.unwrap();
            assert_eq!(first.into_locator().unwrap().key, "form");
        }

        #[tokio::test]
        async fn test_history_and_navigation() {
            let engine = MockEngine::new();
            engine.goto("https://example.com").await.unwrap();
            assert_eq!(engine.url(), "https://example.com");
            assert!(engine.was_called("goto"));
            assert!(!engine.was_called("click"));
        }

        #[tokio::test]
        async fn test_generated_content_lists_keys() {
            let engine = MockEngine::new().with_element("#continue-btn", MockElement::new());
            let html = engine.content().await.unwrap();
            assert!(html.contains("#continue-btn"));
        }
    }
}
