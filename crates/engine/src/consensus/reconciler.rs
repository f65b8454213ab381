use crate::consensus::{ConsensusGroup, Supervisor, SupervisorInput};
use crate::core::{AnalysisError, Finding, SeverityRanking};
use crate::patterns::{PatternCoverage, PatternScanReport};
use crate::providers::ProviderResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const MAJORITY_STRATEGY: &str = "prefer majority, tie-break to higher risk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    SupervisorVerified,
    StatisticalConsensus,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SupervisorVerified => "SUPERVISOR_VERIFIED",
            Self::StatisticalConsensus => "STATISTICAL_CONSENSUS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    RiskLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Distinct values in first-seen order.
    pub values: Vec<String>,
    pub providers: Vec<String>,
    pub strategy: String,
    pub resolved: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledFindingSet {
    pub findings: Vec<Finding>,

    pub verified_findings: Vec<Finding>,

    #[serde(default)]
    pub pattern_findings: Vec<Finding>,

    #[serde(default)]
    pub pattern_coverage: PatternCoverage,

    pub conflicts: Vec<Conflict>,

    #[serde(default)]
    pub consensus_groups: Vec<ConsensusGroup>,

    pub verification_status: VerificationStatus,

    pub consensus_score: f64,

    pub average_score: f64,

    pub risk_label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl ReconciledFindingSet {
    /// Supervisor pass completed: verified findings first, then provider findings, deduplicated.
    pub fn supervisor_verified(
        verified: Vec<Finding>,
        results: &[ProviderResult],
        groups: Vec<ConsensusGroup>,
        ranking: &SeverityRanking,
    ) -> Self {
        let provider_findings = results.iter().flat_map(|r| r.findings.iter().cloned());
        let findings = merge(verified.iter().cloned().chain(provider_findings), ranking);
        let conflicts = detect_conflicts(results);
        let average_score = average_score(results);
        let risk_label = conflicts
            .first()
            .map(|c| c.resolved.clone())
            .or_else(|| majority_label(results))
            .unwrap_or_else(|| statistical_risk_label(average_score).to_string());

        Self {
            findings,
            verified_findings: verified,
            pattern_findings: Vec::new(),
            pattern_coverage: PatternCoverage::default(),
            conflicts,
            consensus_groups: groups,
            verification_status: VerificationStatus::SupervisorVerified,
            consensus_score: consensus_score(results),
            average_score,
            risk_label,
            fallback_reason: None,
        }
    }

    /// Deterministic fallback when the supervisor pass cannot complete.
    pub fn statistical_consensus(
        results: &[ProviderResult],
        groups: Vec<ConsensusGroup>,
        ranking: &SeverityRanking,
        reason: impl Into<String>,
    ) -> Self {
        let findings = merge(results.iter().flat_map(|r| r.findings.iter().cloned()), ranking);
        let average_score = average_score(results);

        Self {
            findings,
            verified_findings: Vec::new(),
            pattern_findings: Vec::new(),
            pattern_coverage: PatternCoverage::default(),
            conflicts: detect_conflicts(results),
            consensus_groups: groups,
            verification_status: VerificationStatus::StatisticalConsensus,
            consensus_score: consensus_score(results),
            average_score,
            risk_label: statistical_risk_label(average_score).to_string(),
            fallback_reason: Some(reason.into()),
        }
    }

    /// Shape used by failed runs: nothing but the given findings.
    pub fn failed(findings: Vec<Finding>, reason: impl Into<String>) -> Self {
        Self {
            findings,
            verified_findings: Vec::new(),
            pattern_findings: Vec::new(),
            pattern_coverage: PatternCoverage::default(),
            conflicts: Vec::new(),
            consensus_groups: Vec::new(),
            verification_status: VerificationStatus::StatisticalConsensus,
            consensus_score: 0.0,
            average_score: 0.0,
            risk_label: "Unknown".to_string(),
            fallback_reason: Some(reason.into()),
        }
    }

    pub fn with_patterns(mut self, report: PatternScanReport) -> Self {
        self.pattern_findings = report.findings;
        self.pattern_coverage = report.coverage;
        self
    }

    /// Reconciled findings followed by pattern findings.
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().chain(self.pattern_findings.iter())
    }
}

pub struct SupervisorReconciler {
    supervisor: Arc<dyn Supervisor>,
    ranking: SeverityRanking,
    timeout: Duration,
}

impl SupervisorReconciler {
    pub fn new(supervisor: Arc<dyn Supervisor>) -> Self {
        Self {
            supervisor,
            ranking: SeverityRanking::default(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_ranking(mut self, ranking: SeverityRanking) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Never fails: any supervisor problem degrades to statistical consensus.
    #[instrument(skip_all, fields(supervisor = self.supervisor.name(), providers = results.len()))]
    pub async fn reconcile(
        &self,
        target: &str,
        results: &[ProviderResult],
        groups: Vec<ConsensusGroup>,
    ) -> ReconciledFindingSet {
        match self.run_supervisor(target, results, &groups).await {
            Ok(verified) => {
                info!(verified = verified.len(), "Supervisor pass completed");
                ReconciledFindingSet::supervisor_verified(verified, results, groups, &self.ranking)
            }
            Err(err) => {
                warn!("Falling back to statistical consensus: {}", err);
                ReconciledFindingSet::statistical_consensus(
                    results,
                    groups,
                    &self.ranking,
                    err.to_string(),
                )
            }
        }
    }

    async fn run_supervisor(
        &self,
        target: &str,
        results: &[ProviderResult],
        groups: &[ConsensusGroup],
    ) -> Result<Vec<Finding>, AnalysisError> {
        let input = SupervisorInput {
            target,
            results,
            groups,
        };

        let verified = tokio::time::timeout(self.timeout, self.supervisor.verify(&input))
            .await
            .map_err(|_| {
                AnalysisError::ReconciliationFailure(format!(
                    "supervisor '{}' timed out after {}s",
                    self.supervisor.name(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                AnalysisError::ReconciliationFailure(format!(
                    "supervisor '{}' failed: {}",
                    self.supervisor.name(),
                    e
                ))
            })?;

        if verified.is_empty() && groups.iter().any(|g| g.is_consensus) {
            return Err(AnalysisError::ReconciliationFailure(format!(
                "supervisor '{}' returned no findings although consensus groups exist",
                self.supervisor.name()
            )));
        }
        Ok(verified)
    }
}

/// Drops later duplicates (severity + title + location), then sorts by rank.
fn merge(findings: impl Iterator<Item = Finding>, ranking: &SeverityRanking) -> Vec<Finding> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Finding> = findings
        .filter(|finding| seen.insert(finding.dedup_key()))
        .collect();
    ranking.sort_by_rank(&mut merged, |f| f.severity);
    merged
}

fn scores(results: &[ProviderResult]) -> Vec<f64> {
    results.iter().filter_map(|r| r.score).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `clamp(1 - stddev/50, 0, 1)` over the population of reported scores; 0 with no scores.
pub fn consensus_score(results: &[ProviderResult]) -> f64 {
    let scores = scores(results);
    if scores.is_empty() {
        return 0.0;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    round2((1.0 - variance.sqrt() / 50.0).clamp(0.0, 1.0))
}

pub fn average_score(results: &[ProviderResult]) -> f64 {
    let scores = scores(results);
    if scores.is_empty() {
        return 0.0;
    }
    round2(scores.iter().sum::<f64>() / scores.len() as f64)
}

pub fn statistical_risk_label(average: f64) -> &'static str {
    if average >= 80.0 {
        "Low"
    } else if average >= 60.0 {
        "Medium"
    } else {
        "High"
    }
}

fn normalize_label(label: &str) -> String {
    let lower = label.trim().to_lowercase();
    lower
        .strip_suffix(" risk")
        .unwrap_or(&lower)
        .trim()
        .to_string()
}

fn label_rank(label: &str) -> u8 {
    match label {
        "critical" => 5,
        "high" => 4,
        "medium" => 3,
        "low" => 2,
        "safe" | "none" => 1,
        _ => 0,
    }
}

fn display_label(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Labels in first-seen order with their providers.
fn collect_labels(results: &[ProviderResult]) -> Vec<(String, Vec<String>)> {
    let mut labels: Vec<(String, Vec<String>)> = Vec::new();
    for result in results {
        let Some(ref raw) = result.risk_label else {
            continue;
        };
        let label = normalize_label(raw);
        if label.is_empty() {
            continue;
        }
        match labels.iter_mut().find(|(l, _)| *l == label) {
            Some((_, providers)) => providers.push(result.provider_id.clone()),
            None => labels.push((label, vec![result.provider_id.clone()])),
        }
    }
    labels
}

fn resolve_majority(labels: &[(String, Vec<String>)]) -> Option<String> {
    labels
        .iter()
        .max_by(|(a, pa), (b, pb)| {
            pa.len()
                .cmp(&pb.len())
                .then_with(|| label_rank(a).cmp(&label_rank(b)))
        })
        .map(|(label, _)| display_label(label))
}

fn majority_label(results: &[ProviderResult]) -> Option<String> {
    resolve_majority(&collect_labels(results))
}

/// Only the overall risk label is checked for disagreement.
pub fn detect_conflicts(results: &[ProviderResult]) -> Vec<Conflict> {
    let labels = collect_labels(results);
    if labels.len() < 2 {
        return Vec::new();
    }

    let providers: Vec<String> = labels.iter().flat_map(|(_, ids)| ids.iter().cloned()).collect();

    let resolved = resolve_majority(&labels).unwrap_or_default();
    vec![Conflict {
        kind: ConflictKind::RiskLabel,
        values: labels.iter().map(|(l, _)| display_label(l)).collect(),
        providers,
        strategy: MAJORITY_STRATEGY.to_string(),
        resolved,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{ConsensusBuilder, ConsensusSupervisor};
    use crate::core::{Confidence, Location, Origin, Severity};
    use crate::providers::{ProviderError, Specialty};
    use async_trait::async_trait;

    fn result(id: &str, score: Option<f64>, label: Option<&str>, findings: Vec<Finding>) -> ProviderResult {
        ProviderResult {
            provider_id: id.to_string(),
            specialty: Specialty::Security,
            findings,
            score,
            risk_label: label.map(str::to_string),
            latency_ms: 1,
            confidence: Confidence::High,
            model: None,
        }
    }

    fn finding(id: &str, severity: Severity, title: &str, line: usize) -> Finding {
        Finding::new(Origin::Provider(id.to_string()), severity, title, "d")
            .with_location(Location::at_line(line))
    }

    struct FailingSupervisor;

    #[async_trait]
    impl Supervisor for FailingSupervisor {
        fn name(&self) -> &str {
            "failing"
        }

        async fn verify(&self, _input: &SupervisorInput<'_>) -> Result<Vec<Finding>, ProviderError> {
            Err(ProviderError::ApiError("down".to_string()))
        }
    }

    struct SlowSupervisor;

    #[async_trait]
    impl Supervisor for SlowSupervisor {
        fn name(&self) -> &str {
            "slow"
        }

        async fn verify(&self, _input: &SupervisorInput<'_>) -> Result<Vec<Finding>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    struct EmptySupervisor;

    #[async_trait]
    impl Supervisor for EmptySupervisor {
        fn name(&self) -> &str {
            "empty"
        }

        async fn verify(&self, _input: &SupervisorInput<'_>) -> Result<Vec<Finding>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn agreeing_results() -> Vec<ProviderResult> {
        vec![
            result(
                "a",
                Some(70.0),
                Some("Medium"),
                vec![finding("a", Severity::Low, "Floating pragma", 1), finding("a", Severity::High, "Reentrancy", 9)],
            ),
            result(
                "b",
                Some(90.0),
                Some("high risk"),
                vec![finding("b", Severity::High, "Reentrancy", 9)],
            ),
        ]
    }

    #[tokio::test]
    async fn test_supervisor_path_dedups_and_orders() {
        let results = agreeing_results();
        let groups = ConsensusBuilder::default().build(&results);
        let reconciler = SupervisorReconciler::new(Arc::new(ConsensusSupervisor));
        let set = reconciler.reconcile("contract A {}", &results, groups).await;

        assert_eq!(set.verification_status, VerificationStatus::SupervisorVerified);
        assert_eq!(set.verified_findings.len(), 1);
        assert_eq!(set.findings.len(), 2);
        assert_eq!(set.findings[0].title, "Reentrancy");
        assert_eq!(set.findings[0].origin, Origin::Supervisor);
        assert_eq!(set.findings[1].title, "Floating pragma");
        assert_eq!(set.consensus_score, 0.8);
        assert!(set.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_failing_supervisor_falls_back() {
        let results = agreeing_results();
        let groups = ConsensusBuilder::default().build(&results);
        let set = SupervisorReconciler::new(Arc::new(FailingSupervisor))
            .reconcile("contract A {}", &results, groups)
            .await;

        assert_eq!(set.verification_status, VerificationStatus::StatisticalConsensus);
        assert!(set.verified_findings.is_empty());
        assert_eq!(set.average_score, 80.0);
        assert_eq!(set.risk_label, "Low");
        assert_eq!(set.findings.len(), 2);
        assert!(set.fallback_reason.unwrap().contains("down"));
    }

    #[tokio::test]
    async fn test_supervisor_timeout_falls_back() {
        let results = agreeing_results();
        let groups = ConsensusBuilder::default().build(&results);
        let set = SupervisorReconciler::new(Arc::new(SlowSupervisor))
            .with_timeout(Duration::from_millis(20))
            .reconcile("contract A {}", &results, groups)
            .await;
        assert_eq!(set.verification_status, VerificationStatus::StatisticalConsensus);
        assert!(set.fallback_reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_proposal_with_consensus_falls_back() {
        let results = agreeing_results();
        let groups = ConsensusBuilder::default().build(&results);
        let set = SupervisorReconciler::new(Arc::new(EmptySupervisor))
            .reconcile("contract A {}", &results, groups)
            .await;
        assert_eq!(set.verification_status, VerificationStatus::StatisticalConsensus);

        let lone = vec![
            result("a", Some(90.0), None, vec![finding("a", Severity::Low, "Only a", 1)]),
            result("b", Some(90.0), None, vec![]),
        ];
        let groups = ConsensusBuilder::default().build(&lone);
        let set = SupervisorReconciler::new(Arc::new(EmptySupervisor))
            .reconcile("contract A {}", &lone, groups)
            .await;
        assert_eq!(set.verification_status, VerificationStatus::SupervisorVerified);
    }

    #[test]
    fn test_consensus_score_bounds() {
        let same = vec![result("a", Some(50.0), None, vec![]), result("b", Some(50.0), None, vec![])];
        assert_eq!(consensus_score(&same), 1.0);

        let spread = vec![result("a", Some(0.0), None, vec![]), result("b", Some(100.0), None, vec![])];
        assert_eq!(consensus_score(&spread), 0.0);

        let none = vec![result("a", None, None, vec![])];
        assert_eq!(consensus_score(&none), 0.0);
        assert_eq!(average_score(&none), 0.0);
        assert_eq!(statistical_risk_label(average_score(&none)), "High");
    }

    #[test]
    fn test_statistical_thresholds() {
        assert_eq!(statistical_risk_label(80.0), "Low");
        assert_eq!(statistical_risk_label(79.99), "Medium");
        assert_eq!(statistical_risk_label(60.0), "Medium");
        assert_eq!(statistical_risk_label(59.0), "High");
    }

    #[test]
    fn test_conflict_majority_and_tie_break() {
        let results = vec![
            result("a", None, Some("Medium"), vec![]),
            result("b", None, Some("medium risk"), vec![]),
            result("c", None, Some("High"), vec![]),
        ];
        let conflicts = detect_conflicts(&results);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].values, vec!["Medium", "High"]);
        assert_eq!(conflicts[0].providers, vec!["a", "b", "c"]);
        assert_eq!(conflicts[0].resolved, "Medium");
        assert_eq!(conflicts[0].strategy, MAJORITY_STRATEGY);

        let tied = vec![
            result("a", None, Some("Low"), vec![]),
            result("b", None, Some("Critical"), vec![]),
        ];
        assert_eq!(detect_conflicts(&tied)[0].resolved, "Critical");

        let agreeing = vec![
            result("a", None, Some("Low"), vec![]),
            result("b", None, Some("low"), vec![]),
        ];
        assert!(detect_conflicts(&agreeing).is_empty());
    }

    #[test]
    fn test_identical_findings_collapse() {
        let results = vec![
            result("a", Some(80.0), None, vec![finding("a", Severity::Medium, "Unchecked call", 5)]),
            result("b", Some(80.0), None, vec![finding("b", Severity::Medium, "unchecked  call", 5)]),
            result("c", Some(80.0), None, vec![finding("c", Severity::Medium, "Unchecked call", 6)]),
        ];
        let set = ReconciledFindingSet::statistical_consensus(
            &results,
            Vec::new(),
            &SeverityRanking::default(),
            "test",
        );
        assert_eq!(set.findings.len(), 2);
        assert_eq!(set.findings[0].origin, Origin::Provider("a".into()));
    }
}
