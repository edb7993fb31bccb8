//! Selfheal: AI-assisted locator healing for browser-driven UI tests
//!
//! Wrap an engine page in a [`HealingPage`]. When an element action times
//! out, the page snapshot goes to a language-model provider, which proposes
//! a replacement selector. The proxy rebinds, retries once, and records the
//! change in a JSON ledger so the test source can be fixed later.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SELFHEAL Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Test code  │    │ Healing    │    │ Browser    │            │
//! │   │            │───►│ Page /     │───►│ Engine     │            │
//! │   │            │    │ Locator    │    │            │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │ timeout                             │
//! │                     ┌─────▼──────┐    ┌────────────┐            │
//! │                     │ Healer     │───►│ Provider   │            │
//! │                     └─────┬──────┘    └────────────┘            │
//! │                           │ candidate                           │
//! │                     ┌─────▼──────┐                              │
//! │                     │ Ledger     │  healing_report.json         │
//! │                     └────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use selfheal::{HealConfig, Healer, HealingPage, MockElement, MockEngine, ScriptedGenerator};
//!
//! # async fn run() -> selfheal::HealResult<()> {
//! let engine = MockEngine::new().with_element("#continue-btn", MockElement::new());
//! let healer = Healer::from_generator(Arc::new(ScriptedGenerator::new().respond("#continue-btn")));
//! let page = HealingPage::with_healer(engine, healer, HealConfig::new())?;
//!
//! let mut button = page.locator("#submit-btn");
//! button.click().await?;
//! assert_eq!(button.descriptor(), "#continue-btn");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Locator classification and heuristic annotations for ledger entries
pub mod analysis;
/// Provider and session configuration
pub mod config;
mod context;
/// Browser engine seam and the in-memory mock engine
pub mod engine;
mod healer;
/// Healing ledger
pub mod ledger;
mod locator;
mod page;
/// Language-model provider adapters
pub mod provider;
mod result;

pub use analysis::{LocatorKind, RootCause, Severity};
pub use config::{load_dotenv, HealConfig, ProviderConfig};
pub use context::{HealContext, TestContext, UNKNOWN_TEST};
pub use engine::{
    Action, ActionOutput, BrowserEngine, EngineEnvironment, FilterOptions, MockElement,
    MockEngine, MockLocator, Selector, Viewport,
};
pub use healer::{
    interpret_response, GenerationFailure, Healer, HealingRequest, Suggestion, ELEMENT_MISSING,
};
pub use ledger::{HealingEvent, HealingLedger, HealingRecord, UpsertOutcome};
pub use locator::HealingLocator;
pub use page::HealingPage;
pub use provider::{create_provider, ProviderKind, ProviderSource, ScriptedGenerator, TextGenerator};
pub use result::{EngineError, HealError, HealResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
