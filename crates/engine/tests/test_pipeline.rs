use quorum_engine::consensus::ProviderSupervisor;
use quorum_engine::core::{FindingCategory, Origin, RunStage};
use quorum_engine::providers::{RegisteredProvider, Specialty};
use quorum_engine::{
    AnalysisEngine, AnalysisRequest, ProviderRegistry, ReportFormat, RiskLevel, ScriptedProvider,
    Severity, Tier, VerificationStatus,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const VAULT: &str = r#"pragma solidity 0.8.19;

contract Vault {
    mapping(address => uint256) public balances;

    function deposit() external payable {
        balances[msg.sender] += msg.value;
    }
}
"#;

fn reentrancy(score: u32) -> Value {
    json!({
        "findings": [{
            "severity": "HIGH",
            "title": "Reentrancy in withdraw",
            "description": "Balance is cleared after the external call",
            "line": 12,
            "recommendation": "Apply checks-effects-interactions"
        }],
        "score": score,
        "riskLevel": "Medium"
    })
}

fn three_providers() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(ScriptedProvider::responding("security", reentrancy(70)), Specialty::Security);
    registry.register(ScriptedProvider::responding("defi", reentrancy(72)), Specialty::DefiEconomics);

    let mut extra = reentrancy(68);
    extra["findings"].as_array_mut().unwrap().push(json!({
        "severity": "LOW",
        "title": "Missing events on deposit",
        "line": 6
    }));
    registry.register(ScriptedProvider::responding("access", extra), Specialty::AccessControl);
    registry
}

#[tokio::test]
async fn test_successful_run_is_supervisor_verified() {
    let engine = AnalysisEngine::builder(three_providers()).build();
    let request = AnalysisRequest::new("Vault", VAULT).with_statistics();

    let result = engine.run_analysis(request).await;

    assert!(result.success, "run failed: {:?}", result.error);
    let set = &result.reconciled_findings;
    assert_eq!(set.verification_status, VerificationStatus::SupervisorVerified);
    assert_eq!(set.findings.len(), 2, "duplicates must collapse");
    assert_eq!(set.findings[0].title, "Reentrancy in withdraw");
    assert!(set.findings[0].verified);
    assert_eq!(set.findings[0].origin, Origin::Supervisor);
    assert_eq!(set.findings[1].severity, Severity::Low);
    assert_eq!(set.consensus_score, 0.97);
    assert_eq!(set.risk_label, "Medium");
    assert!(set.conflicts.is_empty());

    let reentrancy = &set.consensus_groups[0];
    assert_eq!(reentrancy.consensus_count, 3);
    assert_eq!(reentrancy.consensus_percentage, 100.0);
    let events = &set.consensus_groups[1];
    assert!(!events.is_consensus);
    assert!((events.consensus_percentage - 100.0 / 3.0).abs() < 1e-9);

    assert_eq!(result.score_card.security, 85);
    assert_eq!(result.score_card.risk_level, RiskLevel::MediumRisk);

    assert_eq!(
        result.report_map.formats(),
        vec![
            ReportFormat::Executive,
            ReportFormat::Technical,
            ReportFormat::MachineReadable,
            ReportFormat::Statistics
        ]
    );
    assert_eq!(
        result.metadata.stages,
        vec![
            RunStage::Queued,
            RunStage::Dispatching,
            RunStage::Reconciling,
            RunStage::Scoring,
            RunStage::Reporting,
            RunStage::Completed
        ]
    );
    assert_eq!(result.metadata.provider_success_rate, 1.0);
}

#[tokio::test]
async fn test_insufficient_providers_fails_the_run() {
    let mut registry = ProviderRegistry::new();
    registry.register(ScriptedProvider::responding("security", reentrancy(70)), Specialty::Security);
    registry.register(ScriptedProvider::failing("gas", "quota exceeded"), Specialty::GasOptimization);
    registry.register(
        ScriptedProvider::responding("quality", json!({"nothing": true})),
        Specialty::CodeQuality,
    );

    let engine = AnalysisEngine::builder(registry).build();
    let result = engine.run_analysis(AnalysisRequest::new("Vault", VAULT)).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("insufficient providers"));
    assert_eq!(result.score_card.overall, 0);
    assert_eq!(result.score_card.risk_level, RiskLevel::Unknown);
    assert_eq!(result.reconciled_findings.findings.len(), 1);
    assert_eq!(result.metadata.providers_failed, vec!["gas", "quality"]);
    assert_eq!(result.provider_failures.len(), 2);
    assert_eq!(
        result.metadata.stages,
        vec![RunStage::Queued, RunStage::Dispatching, RunStage::Failed]
    );
    assert_eq!(result.report_map.len(), 3);
}

#[tokio::test]
async fn test_panicking_and_slow_providers_are_isolated() {
    let mut registry = three_providers();
    registry.register(ScriptedProvider::panicking("flaky", "backend bug"), Specialty::General);
    registry.register_entry(RegisteredProvider {
        provider: Arc::new(
            ScriptedProvider::responding("slow", reentrancy(10)).with_delay(Duration::from_secs(10)),
        ),
        specialty: Specialty::General,
        timeout: Some(Duration::from_millis(50)),
        instructions: None,
    });

    let engine = AnalysisEngine::builder(registry).build();
    let request = AnalysisRequest::new("Vault", VAULT).with_tier(Tier::Premium);
    let result = engine.run_analysis(request).await;

    assert!(result.success);
    assert_eq!(result.metadata.providers_succeeded.len(), 3);
    assert_eq!(result.metadata.providers_failed, vec!["flaky", "slow"]);
    assert!((result.metadata.provider_success_rate - 0.6).abs() < 1e-9);
}

#[tokio::test]
async fn test_supervisor_failure_falls_back_to_statistical_consensus() {
    let judge = Arc::new(ScriptedProvider::failing("judge", "offline"));
    let engine = AnalysisEngine::builder(three_providers())
        .with_supervisor(Arc::new(ProviderSupervisor::new(judge.clone(), Duration::from_secs(5))))
        .build();

    let result = engine.run_analysis(AnalysisRequest::new("Vault", VAULT)).await;

    assert!(result.success);
    assert_eq!(judge.call_count(), 1);
    let set = &result.reconciled_findings;
    assert_eq!(set.verification_status, VerificationStatus::StatisticalConsensus);
    assert!(set.verified_findings.is_empty());
    assert_eq!(set.average_score, 70.0);
    assert_eq!(set.risk_label, "Medium");
    assert!(set.fallback_reason.as_deref().unwrap().contains("offline"));
    assert_eq!(set.findings.len(), 2);
    assert!(!set.findings[0].verified);
}

#[tokio::test]
async fn test_pattern_findings_join_the_score() {
    let source = r#"pragma solidity ^0.8.0;

contract Wallet {
    address owner;

    function transfer(address to, uint256 amount) external {
        require(tx.origin == owner);
        (bool ok, ) = to.call{value: amount}("");
        require(ok);
    }
}
"#;
    let mut registry = ProviderRegistry::new();
    let clean = json!({"findings": [], "score": 95, "riskLevel": "Low"});
    registry.register(ScriptedProvider::responding("a", clean.clone()), Specialty::Security);
    registry.register(ScriptedProvider::responding("b", clean), Specialty::Security);

    let engine = AnalysisEngine::builder(registry).build();
    let result = engine.run_analysis(AnalysisRequest::new("Wallet", source)).await;

    assert!(result.success);
    let set = &result.reconciled_findings;
    assert!(set.findings.is_empty());
    let rules: Vec<&str> = set
        .pattern_findings
        .iter()
        .filter_map(|f| f.rule_id.as_deref())
        .collect();
    assert!(rules.contains(&"reentrancy-call-value"));
    assert!(rules.contains(&"tx-origin-authentication"));
    assert!(rules.contains(&"floating-pragma"));
    assert!(set.pattern_findings.iter().all(|f| f.origin == Origin::Pattern));
    assert!(set.pattern_coverage.percentage > 0.0);

    assert!(result.score_card.breakdown.high >= 2);
    assert_eq!(result.score_card.risk_level, RiskLevel::HighRisk);
}

#[tokio::test]
async fn test_critical_findings_decide_risk_regardless_of_title() {
    let response = json!({
        "findings": [
            {
                "severity": "CRITICAL",
                "title": "Unused return value of token transfer lets attacker drain vault",
                "line": 7
            },
            {
                "severity": "CRITICAL",
                "title": "Gas griefing locks all user funds",
                "line": 18
            }
        ],
        "score": 20,
        "riskLevel": "Critical"
    });
    let mut registry = ProviderRegistry::new();
    registry.register(ScriptedProvider::responding("security", response.clone()), Specialty::Security);
    registry.register(ScriptedProvider::responding("auditor", response), Specialty::Security);

    let engine = AnalysisEngine::builder(registry).build();
    let result = engine.run_analysis(AnalysisRequest::new("Vault", VAULT)).await;

    assert!(result.success);
    let set = &result.reconciled_findings;
    assert_eq!(set.findings.len(), 2);
    assert!(set
        .findings
        .iter()
        .all(|f| f.category == FindingCategory::Security));
    assert_eq!(result.score_card.breakdown.critical, 2);
    assert_eq!(result.score_card.security, 50);
    assert_eq!(result.score_card.risk_level, RiskLevel::CriticalRisk);
}
