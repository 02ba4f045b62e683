//! CLI integration tests for routewise
//!
//! Tests the routewise CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command with an isolated config directory
#[allow(deprecated)]
fn routewise_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("routewise").unwrap();
    cmd.env("ROUTEWISE_CONFIG_DIR", config_dir.path());
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    routewise_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("route"))
        .stdout(predicate::str::contains("price"));
}

#[test]
fn test_version_output() {
    let dir = TempDir::new().unwrap();
    routewise_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_classify_text_output() {
    let dir = TempDir::new().unwrap();
    routewise_cmd(&dir)
        .args(["classify", "write a function to reverse a string"])
        .assert()
        .success()
        .stdout(predicate::str::contains("code-generation"));
}

#[test]
fn test_classify_json_output() {
    let dir = TempDir::new().unwrap();
    let output = routewise_cmd(&dir)
        .args(["classify", "", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["type"], "general-conversation");
    assert_eq!(value["confidence"], 0.3);
    assert_eq!(value["estimatedTokens"], 0);
}

#[test]
fn test_route_uses_configured_providers() {
    let dir = TempDir::new().unwrap();
    routewise_cmd(&dir)
        .args(["config", "set", "providers.available", "openai, anthropic"])
        .assert()
        .success();

    let output = routewise_cmd(&dir)
        .args(["route", "tell me a joke", "--prefer", "anthropic", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["provider"], "anthropic");
    assert_eq!(value["fallbackProviders"], serde_json::json!(["openai"]));
}

#[test]
fn test_route_rejects_unknown_provider() {
    let dir = TempDir::new().unwrap();
    routewise_cmd(&dir)
        .args(["route", "hello", "--prefer", "acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider"));
}

#[test]
fn test_price_quote() {
    let dir = TempDir::new().unwrap();
    let output = routewise_cmd(&dir)
        .args(["price", "google", "gemini-2.5-flash", "1000", "500", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!((value["cost"].as_f64().unwrap() - 0.0005).abs() < 1e-12);
    assert_eq!(value["canAutoApprove"], true);
    assert_eq!(value["needsApproval"], false);
}

#[test]
fn test_config_set_get_roundtrip() {
    let dir = TempDir::new().unwrap();

    routewise_cmd(&dir)
        .args(["config", "set", "cost.approval_threshold", "0.25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set cost.approval_threshold = 0.25"));

    routewise_cmd(&dir)
        .args(["config", "get", "cost.approval_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0.25\n"));

    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_quiet_set() {
    let dir = TempDir::new().unwrap();
    routewise_cmd(&dir)
        .args(["--quiet", "config", "set", "routing.max_fallbacks", "2"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_config_unknown_key_fails() {
    let dir = TempDir::new().unwrap();
    routewise_cmd(&dir)
        .args(["config", "get", "routing.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_config_list_and_path() {
    let dir = TempDir::new().unwrap();

    routewise_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("server.bind = 127.0.0.1:3000"))
        .stdout(predicate::str::contains("routing.max_fallbacks = 3"));

    routewise_cmd(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
