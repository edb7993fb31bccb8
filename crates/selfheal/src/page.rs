//! Page facade.
//!
//! [`HealingPage`] wraps an engine page. Element queries return
//! [`HealingLocator`]s bound to the page's healer and ledger; everything
//! else passes straight through to the engine.

use std::sync::Arc;

use crate::config::{HealConfig, ProviderConfig};
use crate::context::TestContext;
use crate::engine::{BrowserEngine, Selector};
use crate::healer::Healer;
use crate::ledger::HealingLedger;
use crate::locator::{HealingLocator, Session};
use crate::result::HealResult;

/// Self-healing page proxy.
///
/// # Example
///
/// ```no_run
/// use selfheal::{HealConfig, HealingPage, MockEngine};
///
/// # async fn run() -> selfheal::HealResult<()> {
/// let page = HealingPage::new(MockEngine::new(), HealConfig::from_env())?;
/// page.goto("https://shop.example/checkout").await?;
/// page.locator("#submit-btn").click().await?;
/// # Ok(())
/// # }
/// ```
pub struct HealingPage<E: BrowserEngine> {
    session: Session<E>,
}

impl<E: BrowserEngine> std::fmt::Debug for HealingPage<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealingPage")
            .field("url", &self.session.engine.url())
            .field("healer", &self.session.healer)
            .field("ledger", &self.session.ledger.path())
            .finish_non_exhaustive()
    }
}

impl<E: BrowserEngine> HealingPage<E> {
    /// Wrap `engine`, resolving the provider from the environment.
    ///
    /// # Errors
    ///
    /// Unknown provider, missing credential, or an unwritable ledger path.
    pub fn new(engine: E, config: HealConfig) -> HealResult<Self> {
        let provider = ProviderConfig::from_env(None, None, None)?;
        Self::with_healer(engine, Healer::new(provider)?, config)
    }

    /// Wrap `engine` with an explicit healer.
    ///
    /// `config.snapshot_limit` is applied to the healer.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger file cannot be created.
    pub fn with_healer(engine: E, healer: Healer, config: HealConfig) -> HealResult<Self> {
        let ledger = HealingLedger::open(&config.ledger_path)?;
        Ok(Self {
            session: Session {
                engine: Arc::new(engine),
                healer: Arc::new(healer.with_snapshot_limit(config.snapshot_limit)),
                ledger: Arc::new(ledger),
                context: Arc::new(TestContext::current()),
                excerpt_limit: config.excerpt_limit,
                confidence: config.confidence,
            },
        })
    }

    /// Share a ledger with other pages
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<HealingLedger>) -> Self {
        self.session.ledger = ledger;
        self
    }

    /// Override the detected test context
    #[must_use]
    pub fn with_context(mut self, context: TestContext) -> Self {
        self.session.context = Arc::new(context);
        self
    }

    /// Navigate
    ///
    /// # Errors
    ///
    /// Engine navigation failure.
    pub async fn goto(&self, url: &str) -> HealResult<()> {
        Ok(self.session.engine.goto(url).await?)
    }

    /// Serialized page HTML
    ///
    /// # Errors
    ///
    /// Engine failure.
    pub async fn content(&self) -> HealResult<String> {
        Ok(self.session.engine.content().await?)
    }

    /// Current URL
    #[must_use]
    pub fn url(&self) -> String {
        self.session.engine.url()
    }

    /// Underlying engine
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.session.engine
    }

    /// Ledger heals are written to
    #[must_use]
    pub fn ledger(&self) -> &HealingLedger {
        &self.session.ledger
    }

    /// Healer
    #[must_use]
    pub fn healer(&self) -> &Healer {
        &self.session.healer
    }

    /// Test context recorded with heals
    #[must_use]
    pub fn context(&self) -> &TestContext {
        &self.session.context
    }

    /// Raw selector query
    #[must_use]
    pub fn locator(&self, selector: &str) -> HealingLocator<E> {
        self.query(Selector::raw(selector))
    }

    /// Query of any kind. Resolves lazily; no engine I/O happens here.
    #[must_use]
    pub fn query(&self, selector: Selector) -> HealingLocator<E> {
        let locator = self.session.engine.query(&selector);
        HealingLocator::new(self.session.clone(), locator, selector.describe())
    }

    /// Role query with an optional accessible name
    #[must_use]
    pub fn get_by_role(&self, role: &str, name: Option<&str>) -> HealingLocator<E> {
        let mut selector = Selector::role(role);
        if let Some(name) = name {
            selector = selector.name(name);
        }
        self.query(selector)
    }

    /// Label query
    #[must_use]
    pub fn get_by_label(&self, text: &str) -> HealingLocator<E> {
        self.query(Selector::label(text))
    }

    /// Placeholder query
    #[must_use]
    pub fn get_by_placeholder(&self, text: &str) -> HealingLocator<E> {
        self.query(Selector::placeholder(text))
    }

    /// Text query
    #[must_use]
    pub fn get_by_text(&self, text: &str) -> HealingLocator<E> {
        self.query(Selector::text(text))
    }

    /// Alt text query
    #[must_use]
    pub fn get_by_alt_text(&self, text: &str) -> HealingLocator<E> {
        self.query(Selector::alt_text(text))
    }

    /// Title query
    #[must_use]
    pub fn get_by_title(&self, text: &str) -> HealingLocator<E> {
        self.query(Selector::title(text))
    }

    /// Test id query
    #[must_use]
    pub fn get_by_test_id(&self, id: &str) -> HealingLocator<E> {
        self.query(Selector::test_id(id))
    }
}
