//! Healing Demo - a renamed button healed against the in-memory engine
//!
//! Demonstrates the heal-and-retry flow without a browser or API key:
//! - a click on `#submit-btn` times out
//! - the scripted provider proposes `#continue-btn`
//! - the proxy rebinds, retries, and writes a ledger entry
//!
//! # Running
//!
//! ```bash
//! cargo run --example heal_demo -p selfheal
//! ```

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use selfheal::{
    HealConfig, HealResult, Healer, HealingPage, MockElement, MockEngine, ScriptedGenerator,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> HealResult<()> {
    println!("=== Selfheal Healing Demo ===\n");

    let engine = MockEngine::new()
        .with_content(r#"<form><button id="continue-btn">Continue</button></form>"#)
        .with_element("#continue-btn", MockElement::new().with_text("Continue"));
    let healer = Healer::from_generator(Arc::new(
        ScriptedGenerator::new().respond("#continue-btn"),
    ));

    let ledger_path = std::env::temp_dir().join("selfheal_demo_report.json");
    let page = HealingPage::with_healer(engine, healer, HealConfig::new().ledger_path(&ledger_path))?;
    page.goto("https://shop.example/checkout").await?;

    let mut button = page.locator("#submit-btn");
    println!("Clicking {}", button.descriptor());
    button.click().await?;
    println!("Clicked after healing; locator is now {}", button.descriptor());
    println!("Button text: {}", button.inner_text().await?);

    println!("\n--- Ledger ({}) ---", ledger_path.display());
    for event in page.ledger().entries() {
        println!(
            "{} [{:?}] {} -> {} ({})",
            event.id,
            event.severity,
            event.locator_issue.original_locator,
            event.locator_issue.suggested_locator,
            event.root_cause_analysis.category,
        );
    }

    println!("\n=== Healing Demo Complete ===");
    Ok(())
}
