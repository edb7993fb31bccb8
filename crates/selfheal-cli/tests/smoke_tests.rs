//! Smoke tests for the selfheal CLI
//!
//! These tests run the binary against ledger files built with the library.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use selfheal::ledger::HealingEvent;
use selfheal::{HealingLedger, HealingRecord, TestContext};
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the selfheal binary, isolated from the caller's env
fn selfheal() -> Command {
    let mut cmd = Command::cargo_bin("selfheal").expect("selfheal binary should exist");
    cmd.env_remove("SELFHEAL_LEDGER").env_remove("RUST_LOG");
    cmd
}

fn ledger_with(dir: &TempDir, heals: &[(&str, &str, &str)]) -> (PathBuf, Vec<HealingEvent>) {
    let path = dir.path().join("healing_report.json");
    let ledger = HealingLedger::open(&path).unwrap();
    let mut events = Vec::new();
    for (test, original, suggested) in heals {
        let record = HealingRecord::new(TestContext::parse(test), *original, *suggested)
            .with_failure("click", "Locator.click: Timeout 5000ms exceeded.");
        let event = HealingEvent::from_record(&record);
        ledger.upsert(&event).unwrap();
        events.push(event);
    }
    (path, events)
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    selfheal()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    selfheal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("fixes"))
        .stdout(predicate::str::contains("--ledger"));
}

#[test]
fn test_no_args_shows_help() {
    selfheal().assert().failure(); // Requires a subcommand
}

// ============================================================================
// list
// ============================================================================

#[test]
fn test_list_text() {
    let dir = TempDir::new().unwrap();
    let (path, events) = ledger_with(
        &dir,
        &[
            ("tests/login.rs::test_sign_in", "#login", "#sign-in"),
            ("tests/cart.rs::test_pay", "#pay", "//div[2]/button"),
        ],
    );
    selfheal()
        .args(["--color", "never", "list", "--ledger"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(events[0].id.as_str()))
        .stdout(predicate::str::contains("#login -> #sign-in"))
        .stdout(predicate::str::contains("critical"));
}

#[test]
fn test_list_json_with_filter() {
    let dir = TempDir::new().unwrap();
    let (path, _) = ledger_with(
        &dir,
        &[
            ("tests/login.rs::test_sign_in", "#login", "#sign-in"),
            ("tests/cart.rs::test_pay", "#pay", "#pay-now"),
        ],
    );
    let output = selfheal()
        .args(["list", "--format", "json", "--test", "cart"])
        .env("SELFHEAL_LEDGER", &path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["locator_issue"]["suggested_locator"], "#pay-now");
}

#[test]
fn test_list_empty_ledger() {
    let dir = TempDir::new().unwrap();
    let (path, _) = ledger_with(&dir, &[]);
    selfheal()
        .args(["--color", "never", "list", "--ledger"])
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("No healing events"));
}

#[test]
fn test_missing_ledger_fails() {
    let dir = TempDir::new().unwrap();
    selfheal()
        .args(["list", "--ledger"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ledger not found"));
}

// ============================================================================
// show
// ============================================================================

#[test]
fn test_show_event() {
    let dir = TempDir::new().unwrap();
    let (path, events) = ledger_with(&dir, &[("suite::test_a", "#old", "#new")]);
    selfheal()
        .args(["show", events[0].id.as_str(), "--ledger"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"original_locator\": \"#old\""))
        .stdout(predicate::str::contains("\"status\": \"healed\""));
}

#[test]
fn test_show_unknown_event() {
    let dir = TempDir::new().unwrap();
    let (path, _) = ledger_with(&dir, &[("suite::test_a", "#old", "#new")]);
    selfheal()
        .args(["show", "HEAL-00000000", "--ledger"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("HEAL-00000000"));
}

// ============================================================================
// fixes
// ============================================================================

#[test]
fn test_fixes_skip_review_by_default() {
    let dir = TempDir::new().unwrap();
    let (path, _) = ledger_with(
        &dir,
        &[
            ("tests/a.rs::test_a", "#old", "#new"),
            ("tests/b.rs::test_b", "#pay", "//div[2]/button"),
        ],
    );
    selfheal()
        .args(["fixes", "--ledger"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r##"+ locator("#new")"##))
        .stdout(predicate::str::contains("//div[2]/button").not());

    selfheal()
        .args(["fixes", "--all", "--ledger"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("review: required"));
}

// ============================================================================
// providers
// ============================================================================

#[test]
fn test_providers() {
    selfheal()
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini (also: google)"))
        .stdout(predicate::str::contains("OPENAI_API_KEY"))
        .stdout(predicate::str::contains("OLLAMA_BASE_URL"));
}

// ============================================================================
// bench
// ============================================================================

/// The binary with no provider credentials in its environment
fn selfheal_without_providers() -> Command {
    let mut cmd = selfheal();
    for var in [
        "AI_PROVIDER",
        "GEMINI_API_KEY",
        "GOOGLE_API_KEY",
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
        "AZURE_OPENAI_API_KEY",
        "AZURE_OPENAI_ENDPOINT",
        "OLLAMA_BASE_URL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_bench_without_providers_fails() {
    selfheal_without_providers()
        .args(["--color", "never", "bench"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Skipping gemini"))
        .stderr(predicate::str::contains("no provider is configured"));
}

#[test]
fn test_bench_unknown_provider_fails() {
    selfheal_without_providers()
        .args(["bench", "--provider", "bard"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider: bard"));
}

#[test]
fn test_bench_unreachable_server_reports_failure() {
    let dir = TempDir::new().unwrap();
    let report_path = dir.path().join("bench.json");
    let output = selfheal_without_providers()
        .env("OLLAMA_BASE_URL", "http://127.0.0.1:1")
        .args(["--color", "never", "bench", "-p", "ollama", "-f", "json", "-o"])
        .arg(&report_path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["summary"]["total_tests"], 1);
    assert_eq!(json["summary"]["failed"], 1);
    let result = &json["results"][0];
    assert_eq!(result["provider"], "ollama");
    assert_eq!(result["success"], false);
    assert!(result["suggested_locator"].is_null());

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(saved["results"][0]["provider"], "ollama");
}
