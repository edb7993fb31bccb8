//! Element proxy with heal-and-retry.
//!
//! A [`HealingLocator`] pairs an engine locator with the descriptor it was
//! built from. Every action goes through [`HealingLocator::perform`]:
//!
//! ```text
//! ATTEMPT ──ok──────────────────────────────────────────► DONE
//!    │ timeout
//!    ▼
//!  HEAL ──no candidate / ELEMENT_MISSING──► original error
//!    │ candidate
//!    ▼
//! record + rebind ──► RETRY ──ok──► DONE
//!                        └──err──► error (no second heal)
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::{HealContext, TestContext};
use crate::engine::{Action, ActionOutput, BrowserEngine, FilterOptions, Selector};
use crate::healer::{truncate_chars, Healer, HealingRequest, Suggestion};
use crate::ledger::{HealingEvent, HealingLedger, HealingRecord};
use crate::result::{EngineError, HealError, HealResult};

/// Everything a locator needs from its page, shared by all locators of it.
pub(crate) struct Session<E: BrowserEngine> {
    pub(crate) engine: Arc<E>,
    pub(crate) healer: Arc<Healer>,
    pub(crate) ledger: Arc<HealingLedger>,
    pub(crate) context: Arc<TestContext>,
    pub(crate) excerpt_limit: usize,
    pub(crate) confidence: f64,
}

impl<E: BrowserEngine> Clone for Session<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            healer: Arc::clone(&self.healer),
            ledger: Arc::clone(&self.ledger),
            context: Arc::clone(&self.context),
            excerpt_limit: self.excerpt_limit,
            confidence: self.confidence,
        }
    }
}

impl<E: BrowserEngine> Session<E> {
    fn record_heal(
        &self,
        original: &str,
        suggested: &str,
        action: &str,
        failure: &EngineError,
        snapshot: &str,
    ) {
        let record = HealingRecord {
            test: (*self.context).clone(),
            original_locator: original.to_string(),
            suggested_locator: suggested.to_string(),
            action: action.to_string(),
            error_type: failure.error_type().to_string(),
            error_message: failure.to_string(),
            page_url: self.engine.url(),
            page_excerpt: truncate_chars(snapshot, self.excerpt_limit).to_string(),
            confidence: self.confidence,
            context: HealContext::capture(&self.engine.environment(), failure),
            provider: self.healer.provider_name().to_string(),
        };
        self.ledger.record(&HealingEvent::from_record(&record));
    }
}

/// Engine locator and its descriptor. Replaced together, never separately.
struct Binding<L> {
    locator: L,
    descriptor: String,
}

/// Self-healing element proxy.
///
/// Owned by one call site; actions take `&mut self` because a heal rebinds
/// the proxy in place.
pub struct HealingLocator<E: BrowserEngine> {
    session: Session<E>,
    binding: Binding<E::Locator>,
}

impl<E: BrowserEngine> fmt::Debug for HealingLocator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealingLocator")
            .field("descriptor", &self.binding.descriptor)
            .field("locator", &self.binding.locator)
            .finish()
    }
}

impl<E: BrowserEngine> HealingLocator<E> {
    pub(crate) fn new(session: Session<E>, locator: E::Locator, descriptor: String) -> Self {
        Self {
            session,
            binding: Binding {
                locator,
                descriptor,
            },
        }
    }

    /// Current descriptor (the healed selector after a heal)
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.binding.descriptor
    }

    /// Current engine locator
    #[must_use]
    pub fn inner(&self) -> &E::Locator {
        &self.binding.locator
    }

    /// Perform `action`, healing once on a timeout.
    ///
    /// Chaining actions return a new proxy whose descriptor extends this
    /// one's. Non-timeout failures, and timeouts the healer cannot fix,
    /// return the engine's original error unchanged.
    ///
    /// # Errors
    ///
    /// [`HealError::Engine`] with the original failure, or with the retry's
    /// failure after a heal was applied.
    pub async fn perform(&mut self, action: Action<E::Locator>) -> HealResult<ActionOutput<Self>> {
        let engine = Arc::clone(&self.session.engine);
        match engine.perform(&self.binding.locator, &action).await {
            Ok(output) => Ok(self.wrap(&action, output)),
            Err(failure) if failure.is_healable() => self.heal_and_retry(action, failure).await,
            Err(failure) => Err(failure.into()),
        }
    }

    async fn heal_and_retry(
        &mut self,
        action: Action<E::Locator>,
        failure: EngineError,
    ) -> HealResult<ActionOutput<Self>> {
        let name = action.name();
        let engine = Arc::clone(&self.session.engine);
        info!(action = name, locator = %self.binding.descriptor, "action failed, attempting to heal");

        let snapshot = match engine.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "could not capture page snapshot, healing skipped");
                return Err(failure.into());
            }
        };
        let request = HealingRequest::new(
            snapshot,
            self.binding.descriptor.clone(),
            name,
            failure.to_string(),
        );

        let candidate = match self.session.healer.heal(&request).await {
            Suggestion::Candidate(candidate) => candidate,
            Suggestion::ElementMissing | Suggestion::Unavailable(_) => {
                warn!(action = name, locator = %self.binding.descriptor, "healing failed");
                return Err(failure.into());
            }
        };

        self.session.record_heal(
            &self.binding.descriptor,
            &candidate,
            name,
            &failure,
            &request.page_snapshot,
        );
        info!(from = %self.binding.descriptor, to = %candidate, "healed locator, retrying");
        self.rebind(&candidate);

        let output = engine.perform(&self.binding.locator, &action).await?;
        Ok(self.wrap(&action, output))
    }

    fn rebind(&mut self, selector: &str) {
        self.binding = Binding {
            locator: self.session.engine.locator(selector),
            descriptor: selector.to_string(),
        };
    }

    fn wrap(&self, action: &Action<E::Locator>, output: ActionOutput<E::Locator>) -> ActionOutput<Self> {
        output.map_locator(|locator| {
            let descriptor = match action.chain_suffix() {
                Some(suffix) => format!("{}{suffix}", self.binding.descriptor),
                None => self.binding.descriptor.clone(),
            };
            debug!(descriptor = %descriptor, "chained locator");
            Self::new(self.session.clone(), locator, descriptor)
        })
    }

    async fn run<T>(
        &mut self,
        action: Action<E::Locator>,
        extract: fn(ActionOutput<Self>) -> Option<T>,
    ) -> HealResult<T> {
        let name = action.name();
        let output = self.perform(action).await?;
        extract(output).ok_or_else(|| HealError::UnexpectedOutput {
            action: name,
            descriptor: self.binding.descriptor.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------

    /// Click the element
    pub async fn click(&mut self) -> HealResult<()> {
        self.run(Action::Click, ActionOutput::into_done).await
    }

    /// Double-click the element
    pub async fn dblclick(&mut self) -> HealResult<()> {
        self.run(Action::DblClick, ActionOutput::into_done).await
    }

    /// Replace the input value
    pub async fn fill(&mut self, value: impl Into<String>) -> HealResult<()> {
        self.run(Action::Fill(value.into()), ActionOutput::into_done).await
    }

    /// Press a key, e.g. `Enter`
    pub async fn press(&mut self, key: impl Into<String>) -> HealResult<()> {
        self.run(Action::Press(key.into()), ActionOutput::into_done).await
    }

    /// Type text key by key
    pub async fn press_sequentially(&mut self, text: impl Into<String>) -> HealResult<()> {
        self.run(Action::PressSequentially(text.into()), ActionOutput::into_done)
            .await
    }

    /// Check a checkbox or radio
    pub async fn check(&mut self) -> HealResult<()> {
        self.run(Action::Check, ActionOutput::into_done).await
    }

    /// Uncheck a checkbox
    pub async fn uncheck(&mut self) -> HealResult<()> {
        self.run(Action::Uncheck, ActionOutput::into_done).await
    }

    /// Hover
    pub async fn hover(&mut self) -> HealResult<()> {
        self.run(Action::Hover, ActionOutput::into_done).await
    }

    /// Focus
    pub async fn focus(&mut self) -> HealResult<()> {
        self.run(Action::Focus, ActionOutput::into_done).await
    }

    /// Clear the input value
    pub async fn clear(&mut self) -> HealResult<()> {
        self.run(Action::Clear, ActionOutput::into_done).await
    }

    /// Select options by value or label
    pub async fn select_option<I, S>(&mut self, values: I) -> HealResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.run(Action::SelectOption(values), ActionOutput::into_done)
            .await
    }

    /// Scroll into view
    pub async fn scroll_into_view(&mut self) -> HealResult<()> {
        self.run(Action::ScrollIntoView, ActionOutput::into_done).await
    }

    /// Wait until attached and visible
    pub async fn wait_for(&mut self) -> HealResult<()> {
        self.run(Action::WaitFor, ActionOutput::into_done).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// `textContent`, `None` if the engine reports null
    pub async fn text_content(&mut self) -> HealResult<Option<String>> {
        self.run(Action::TextContent, ActionOutput::into_text).await
    }

    /// Rendered text
    pub async fn inner_text(&mut self) -> HealResult<String> {
        self.run(Action::InnerText, |o| o.into_text().flatten()).await
    }

    /// Inner markup
    pub async fn inner_html(&mut self) -> HealResult<String> {
        self.run(Action::InnerHtml, |o| o.into_text().flatten()).await
    }

    /// Current input value
    pub async fn input_value(&mut self) -> HealResult<String> {
        self.run(Action::InputValue, |o| o.into_text().flatten()).await
    }

    /// Attribute value, `None` if absent
    pub async fn get_attribute(&mut self, name: impl Into<String>) -> HealResult<Option<String>> {
        self.run(Action::GetAttribute(name.into()), ActionOutput::into_text)
            .await
    }

    /// Visible right now
    pub async fn is_visible(&mut self) -> HealResult<bool> {
        self.run(Action::IsVisible, ActionOutput::into_flag).await
    }

    /// Hidden right now
    pub async fn is_hidden(&mut self) -> HealResult<bool> {
        self.run(Action::IsHidden, ActionOutput::into_flag).await
    }

    /// Enabled
    pub async fn is_enabled(&mut self) -> HealResult<bool> {
        self.run(Action::IsEnabled, ActionOutput::into_flag).await
    }

    /// Checked
    pub async fn is_checked(&mut self) -> HealResult<bool> {
        self.run(Action::IsChecked, ActionOutput::into_flag).await
    }

    /// Number of matches
    pub async fn count(&mut self) -> HealResult<usize> {
        self.run(Action::Count, ActionOutput::into_count).await
    }

    /// `textContent` of every match
    pub async fn all_text_contents(&mut self) -> HealResult<Vec<String>> {
        self.run(Action::AllTextContents, ActionOutput::into_texts).await
    }

    // ------------------------------------------------------------------
    // Chaining
    // ------------------------------------------------------------------

    /// Nested raw query: `D >> selector`
    pub async fn locator(&mut self, selector: impl Into<String>) -> HealResult<Self> {
        self.run(Action::Locator(selector.into()), ActionOutput::into_locator)
            .await
    }

    /// Narrow by text
    pub async fn filter(&mut self, options: FilterOptions) -> HealResult<Self> {
        self.run(Action::Filter(options), ActionOutput::into_locator).await
    }

    /// Elements matching this and `other`
    pub async fn and(&mut self, other: &Self) -> HealResult<Self> {
        let action = Action::And {
            locator: other.binding.locator.clone(),
            descriptor: other.binding.descriptor.clone(),
        };
        self.run(action, ActionOutput::into_locator).await
    }

    /// Elements matching this or `other`
    pub async fn or(&mut self, other: &Self) -> HealResult<Self> {
        let action = Action::Or {
            locator: other.binding.locator.clone(),
            descriptor: other.binding.descriptor.clone(),
        };
        self.run(action, ActionOutput::into_locator).await
    }

    /// First match
    pub async fn first(&mut self) -> HealResult<Self> {
        self.run(Action::First, ActionOutput::into_locator).await
    }

    /// Last match
    pub async fn last(&mut self) -> HealResult<Self> {
        self.run(Action::Last, ActionOutput::into_locator).await
    }

    /// Match at `index`
    pub async fn nth(&mut self, index: i32) -> HealResult<Self> {
        self.run(Action::Nth(index), ActionOutput::into_locator).await
    }

    /// Nested query of any kind
    pub async fn query(&mut self, selector: Selector) -> HealResult<Self> {
        self.run(Action::Query(selector), ActionOutput::into_locator).await
    }

    /// Nested role query
    pub async fn get_by_role(&mut self, role: &str, name: Option<&str>) -> HealResult<Self> {
        let mut selector = Selector::role(role);
        if let Some(name) = name {
            selector = selector.name(name);
        }
        self.query(selector).await
    }

    /// Nested label query
    pub async fn get_by_label(&mut self, text: &str) -> HealResult<Self> {
        self.query(Selector::label(text)).await
    }

    /// Nested placeholder query
    pub async fn get_by_placeholder(&mut self, text: &str) -> HealResult<Self> {
        self.query(Selector::placeholder(text)).await
    }

    /// Nested text query
    pub async fn get_by_text(&mut self, text: &str) -> HealResult<Self> {
        self.query(Selector::text(text)).await
    }

    /// Nested alt text query
    pub async fn get_by_alt_text(&mut self, text: &str) -> HealResult<Self> {
        self.query(Selector::alt_text(text)).await
    }

    /// Nested title query
    pub async fn get_by_title(&mut self, text: &str) -> HealResult<Self> {
        self.query(Selector::title(text)).await
    }

    /// Nested test id query
    pub async fn get_by_test_id(&mut self, id: &str) -> HealResult<Self> {
        self.query(Selector::test_id(id)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::HealConfig;
    use crate::engine::{EngineEnvironment, MockElement, MockEngine, MockLocator};
    use crate::page::HealingPage;
    use crate::provider::ScriptedGenerator;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        page: HealingPage<MockEngine>,
        scripted: Arc<ScriptedGenerator>,
    }

    fn fixture(engine: MockEngine, scripted: ScriptedGenerator) -> Fixture {
        let dir = TempDir::new().unwrap();
        let scripted = Arc::new(scripted);
        let healer = Healer::from_generator(scripted.clone());
        let config = HealConfig::new().ledger_path(dir.path().join("heal.json"));
        let page = HealingPage::with_healer(engine, healer, config)
            .unwrap()
            .with_context(TestContext::parse("locator::tests::fixture"));
        Fixture {
            _dir: dir,
            page,
            scripted,
        }
    }

    mod chaining_tests {
        use super::*;

        #[tokio::test]
        async fn test_descriptors_extend_parent() {
            let f = fixture(MockEngine::new(), ScriptedGenerator::new());
            let mut list = f.page.locator("ul.items");

            assert_eq!(list.locator("li").await.unwrap().descriptor(), "ul.items >> li");
            assert_eq!(list.first().await.unwrap().descriptor(), "ul.items.first()");
            assert_eq!(list.last().await.unwrap().descriptor(), "ul.items.last()");
            assert_eq!(list.nth(2).await.unwrap().descriptor(), "ul.items.nth(2)");
            assert_eq!(
                list.filter(FilterOptions::has_text("Milk"))
                    .await
                    .unwrap()
                    .descriptor(),
                "ul.items.filter(has_text='Milk')"
            );
            assert_eq!(
                list.get_by_role("listitem", Some("Milk"))
                    .await
                    .unwrap()
                    .descriptor(),
                "ul.items.get_by_role('listitem', name='Milk')"
            );
            assert_eq!(f.scripted.calls(), 0);
        }

        #[tokio::test]
        async fn test_and_or_render_other_descriptor() {
            let f = fixture(MockEngine::new(), ScriptedGenerator::new());
            let mut button = f.page.get_by_role("button", None);
            let submit = f.page.locator("[type=submit]");
            assert_eq!(
                button.and(&submit).await.unwrap().descriptor(),
                "get_by_role('button').and([type=submit])"
            );
            assert_eq!(
                button.or(&submit).await.unwrap().descriptor(),
                "get_by_role('button').or([type=submit])"
            );
        }

        #[tokio::test]
        async fn test_nested_chain_resolves() {
            let engine = MockEngine::new().with_element(
                "form#login >> get_by_label('Email')",
                MockElement::new(),
            );
            let f = fixture(engine, ScriptedGenerator::new());
            let mut form = f.page.locator("form#login");
            let mut email = form.get_by_label("Email").await.unwrap().first().await.unwrap();
            email.fill("a@b.c").await.unwrap();
            assert_eq!(email.descriptor(), "form#login.get_by_label('Email').first()");
            assert_eq!(email.input_value().await.unwrap(), "a@b.c");
        }
    }

    mod heal_tests {
        use super::*;

        #[tokio::test]
        async fn test_heal_rebinds_in_place() {
            let engine = MockEngine::new()
                .with_element("#continue-btn", MockElement::new().with_text("Continue"));
            let f = fixture(engine, ScriptedGenerator::new().respond("#continue-btn"));

            let mut button = f.page.locator("#submit-btn");
            button.click().await.unwrap();
            assert_eq!(button.descriptor(), "#continue-btn");
            assert_eq!(button.inner(), &MockLocator { key: "#continue-btn".into() });

            // Later actions use the healed binding without healing again
            assert_eq!(button.inner_text().await.unwrap(), "Continue");
            assert_eq!(f.scripted.calls(), 1);
        }

        #[tokio::test]
        async fn test_chain_after_heal_uses_healed_descriptor() {
            let engine = MockEngine::new()
                .with_element("#menu", MockElement::new())
                .with_element("#menu >> a.home", MockElement::new());
            let f = fixture(engine, ScriptedGenerator::new().respond("#menu"));

            let mut nav = f.page.locator("#nav");
            nav.hover().await.unwrap();
            let mut home = nav.locator("a.home").await.unwrap();
            assert_eq!(home.descriptor(), "#menu >> a.home");
            home.click().await.unwrap();
        }

        #[tokio::test]
        async fn test_non_timeout_is_not_healed() {
            let engine = MockEngine::new().with_element("#name", MockElement::new().disabled());
            let f = fixture(engine, ScriptedGenerator::new().respond("#other"));

            let mut input = f.page.locator("#name");
            let err = input.fill("x").await.unwrap_err();
            assert!(matches!(err, HealError::Engine(EngineError::Action { .. })));
            assert_eq!(f.scripted.calls(), 0);
            assert_eq!(input.descriptor(), "#name");
        }

        #[tokio::test]
        async fn test_snapshot_failure_returns_original_error() {
            struct NoContent(MockEngine);

            #[async_trait::async_trait]
            impl BrowserEngine for NoContent {
                type Locator = MockLocator;

                fn query(&self, selector: &Selector) -> MockLocator {
                    self.0.query(selector)
                }

                async fn perform(
                    &self,
                    locator: &MockLocator,
                    action: &Action<MockLocator>,
                ) -> Result<ActionOutput<MockLocator>, EngineError> {
                    self.0.perform(locator, action).await
                }

                async fn content(&self) -> Result<String, EngineError> {
                    Err(EngineError::action("page crashed"))
                }

                async fn goto(&self, url: &str) -> Result<(), EngineError> {
                    self.0.goto(url).await
                }

                fn url(&self) -> String {
                    self.0.url()
                }

                fn environment(&self) -> EngineEnvironment {
                    EngineEnvironment::default()
                }
            }

            let dir = TempDir::new().unwrap();
            let scripted = Arc::new(ScriptedGenerator::new().respond("#x"));
            let page = HealingPage::with_healer(
                NoContent(MockEngine::new()),
                Healer::from_generator(scripted.clone()),
                HealConfig::new().ledger_path(dir.path().join("heal.json")),
            )
            .unwrap();

            let err = page.locator("#gone").click().await.unwrap_err();
            assert!(err.to_string().starts_with("Locator.click: Timeout"));
            assert_eq!(scripted.calls(), 0);
        }

        #[tokio::test]
        async fn test_unexpected_output_names_action() {
            struct Wrong(MockEngine);

            #[async_trait::async_trait]
            impl BrowserEngine for Wrong {
                type Locator = MockLocator;

                fn query(&self, selector: &Selector) -> MockLocator {
                    self.0.query(selector)
                }

                async fn perform(
                    &self,
                    _locator: &MockLocator,
                    _action: &Action<MockLocator>,
                ) -> Result<ActionOutput<MockLocator>, EngineError> {
                    Ok(ActionOutput::Flag(true))
                }

                async fn content(&self) -> Result<String, EngineError> {
                    self.0.content().await
                }

                async fn goto(&self, url: &str) -> Result<(), EngineError> {
                    self.0.goto(url).await
                }

                fn url(&self) -> String {
                    self.0.url()
                }
            }

            let dir = TempDir::new().unwrap();
            let page = HealingPage::with_healer(
                Wrong(MockEngine::new()),
                Healer::from_generator(Arc::new(ScriptedGenerator::new())),
                HealConfig::new().ledger_path(dir.path().join("heal.json")),
            )
            .unwrap();

            let err = page.locator("#a").count().await.unwrap_err();
            assert!(matches!(
                err,
                HealError::UnexpectedOutput { action: "count", .. }
            ));
        }
    }
}
