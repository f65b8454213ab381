use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const WALLET: &str = r#"pragma solidity ^0.8.0;

contract Wallet {
    address owner;

    function transfer(address to, uint256 amount) external {
        require(tx.origin == owner);
        (bool ok, ) = to.call{value: amount}("");
        require(ok);
    }
}
"#;

const CONFIG: &str = r#"
providers:
  - id: security
    specialty: security
    type: fixture
    path: fixtures/security.json
  - id: defi
    specialty: defi-economics
    type: fixture
    path: fixtures/defi.json
global:
  batch_delay_ms: 0
"#;

fn quorum() -> Command {
    let mut cmd = Command::cargo_bin("quorum").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("QUORUM_MIN_PROVIDERS")
        .env_remove("QUORUM_BATCH_DELAY_MS");
    cmd
}

/// Two fixture-backed providers that both report the same reentrancy issue.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let fixtures = dir.path().join("fixtures");
    fs::create_dir(&fixtures).unwrap();

    let response = r#"{
        "findings": [{
            "severity": "HIGH",
            "title": "Reentrancy in transfer",
            "description": "External call with value before state is settled",
            "line": 8
        }],
        "score": 60,
        "riskLevel": "High"
    }"#;
    fs::write(fixtures.join("security.json"), response).unwrap();
    fs::write(fixtures.join("defi.json"), response).unwrap();
    fs::write(dir.path().join("quorum.yaml"), CONFIG).unwrap();
    fs::write(dir.path().join("Wallet.sol"), WALLET).unwrap();
    dir
}

fn analyze_json(dir: &Path, contract: &str) -> serde_json::Value {
    let output = quorum()
        .arg("analyze")
        .arg(dir.join(contract))
        .arg("--config")
        .arg(dir.join("quorum.yaml"))
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_init_config_prints_example() {
    quorum()
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("providers:"))
        .stdout(predicate::str::contains("min_successful_providers"));
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quorum.yaml");
    fs::write(&path, "existing").unwrap();

    quorum()
        .arg("init-config")
        .arg("--output")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "existing");
}

#[test]
fn test_scan_reports_patterns() {
    let dir = workspace();

    quorum()
        .arg("scan")
        .arg(dir.path().join("Wallet.sol"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Coverage:"));

    let output = quorum()
        .arg("scan")
        .arg(dir.path().join("Wallet.sol"))
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rules: Vec<&str> = report["findings"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["ruleId"].as_str())
        .collect();
    assert!(rules.contains(&"tx-origin-authentication"));
}

#[test]
fn test_scan_missing_file_fails() {
    quorum()
        .args(["scan", "does-not-exist.sol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_analyze_with_fixture_providers() {
    let dir = workspace();
    let result = analyze_json(dir.path(), "Wallet.sol");

    assert_eq!(result["success"], true);
    assert_eq!(result["metadata"]["contractName"], "Wallet");
    assert_eq!(
        result["reconciledFindings"]["findings"][0]["title"],
        "Reentrancy in transfer"
    );
    assert!(result["reportMap"]["machine-readable"].is_object());
}

#[test]
fn test_analyze_persists_reports() {
    let dir = workspace();
    let out_dir = dir.path().join("reports");

    quorum()
        .arg("analyze")
        .arg(dir.path().join("Wallet.sol"))
        .arg("--config")
        .arg(dir.path().join("quorum.yaml"))
        .args(["--formats", "executive,technical"])
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("ANALYSIS: Wallet"));

    let runs: Vec<_> = fs::read_dir(&out_dir).unwrap().collect();
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].as_ref().unwrap().path();
    assert!(run_dir.join("executive.json").exists());
    assert!(run_dir.join("technical.json").exists());
}

#[test]
fn test_analyze_fails_without_quorum() {
    let dir = workspace();
    let config = r#"
providers:
  - id: security
    type: fixture
    path: fixtures/security.json
"#;
    fs::write(dir.path().join("single.yaml"), config).unwrap();

    quorum()
        .arg("analyze")
        .arg(dir.path().join("Wallet.sol"))
        .arg("--config")
        .arg(dir.path().join("single.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient providers"));
}

#[test]
fn test_batch_walks_directories() {
    let dir = workspace();
    let contracts = dir.path().join("contracts");
    fs::create_dir(&contracts).unwrap();
    fs::copy(dir.path().join("Wallet.sol"), contracts.join("A.sol")).unwrap();
    fs::copy(dir.path().join("Wallet.sol"), contracts.join("B.sol")).unwrap();
    fs::write(contracts.join("notes.txt"), "not a contract").unwrap();

    let output = quorum()
        .arg("batch")
        .arg(&contracts)
        .arg("--config")
        .arg(dir.path().join("quorum.yaml"))
        .args(["--format", "json", "--delay-ms", "0"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let batch: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(batch["total"], 2);
    assert_eq!(batch["successCount"], 2);
    assert_eq!(batch["items"][0]["metadata"]["contractName"], "A");
    assert_eq!(batch["items"][1]["metadata"]["contractName"], "B");
}

#[test]
fn test_compare_saved_results() {
    let dir = workspace();
    let result = analyze_json(dir.path(), "Wallet.sol");
    let previous = dir.path().join("previous.json");
    fs::write(&previous, serde_json::to_string(&result).unwrap()).unwrap();

    quorum()
        .arg("compare")
        .arg(&previous)
        .arg(&previous)
        .args(["--format", "markdown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("**Trend:** stable"));
}
