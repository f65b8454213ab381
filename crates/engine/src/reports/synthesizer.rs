use crate::consensus::{ConsensusGroup, ConsensusStatistics, ReconciledFindingSet, VerificationStatus};
use crate::core::{AnalysisError, Finding, FindingCategory, RunMetadata, Severity, SeverityRanking};
use crate::reports::formats::*;
use crate::scoring::ScoreCard;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

pub const UNKNOWN_IMPACT: &str = "Unknown impact";
pub const NO_RECOMMENDATION: &str = "No recommendation provided";
pub const UNKNOWN_LOCATION: &str = "Unknown location";
pub const NO_DESCRIPTION: &str = "No description provided";

/// Likelihood and business impact wording per severity, used by the risk matrix.
#[derive(Debug, Clone)]
pub struct RiskTable {
    entries: HashMap<Severity, (String, String)>,
}

impl Default for RiskTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            Severity::Critical,
            (
                "Almost certain".to_string(),
                "Total loss of funds or of contract control".to_string(),
            ),
        );
        entries.insert(
            Severity::High,
            (
                "Likely".to_string(),
                "Significant loss of funds or broken core functionality".to_string(),
            ),
        );
        entries.insert(
            Severity::Medium,
            (
                "Possible".to_string(),
                "Limited loss or degraded functionality under specific conditions".to_string(),
            ),
        );
        entries.insert(
            Severity::Low,
            (
                "Unlikely".to_string(),
                "Minor impact without direct loss of funds".to_string(),
            ),
        );
        entries.insert(
            Severity::Info,
            (
                "Rare".to_string(),
                "No direct impact; deviation from best practice".to_string(),
            ),
        );
        Self { entries }
    }
}

impl RiskTable {
    pub fn with_entry(
        mut self,
        severity: Severity,
        likelihood: impl Into<String>,
        business_impact: impl Into<String>,
    ) -> Self {
        self.entries
            .insert(severity, (likelihood.into(), business_impact.into()));
        self
    }

    pub fn lookup(&self, severity: Severity) -> (&str, &str) {
        self.entries
            .get(&severity)
            .map(|(l, b)| (l.as_str(), b.as_str()))
            .unwrap_or(("Unknown", UNKNOWN_IMPACT))
    }
}

/// Turns findings, scores and run metadata into report representations.
///
/// Every renderer only reads its inputs. A renderer error is contained to its own format,
/// which then carries a [`FallbackReport`].
#[derive(Debug, Clone)]
pub struct ReportSynthesizer {
    ranking: SeverityRanking,
    risk_table: RiskTable,
    key_findings_limit: usize,
}

impl Default for ReportSynthesizer {
    fn default() -> Self {
        Self::new(SeverityRanking::default())
    }
}

impl ReportSynthesizer {
    pub fn new(ranking: SeverityRanking) -> Self {
        Self {
            ranking,
            risk_table: RiskTable::default(),
            key_findings_limit: 5,
        }
    }

    pub fn with_risk_table(mut self, risk_table: RiskTable) -> Self {
        self.risk_table = risk_table;
        self
    }

    pub fn with_key_findings_limit(mut self, limit: usize) -> Self {
        self.key_findings_limit = limit;
        self
    }

    pub fn synthesize(
        &self,
        set: &ReconciledFindingSet,
        scores: &ScoreCard,
        metadata: &RunMetadata,
        formats: &[ReportFormat],
    ) -> ReportMap {
        let mut map = ReportMap::new();
        for &format in formats {
            let report = match self.render(format, set, scores, metadata) {
                Ok(report) => report,
                Err(err) => {
                    warn!(format = %format, "Report rendering failed: {}", err);
                    Report::Fallback(FallbackReport {
                        requested_format: format,
                        contract_name: metadata.contract_name.clone(),
                        error: err.to_string(),
                    })
                }
            };
            map.insert(format, report);
        }
        debug!(reports = map.len(), "Reports synthesized");
        map
    }

    pub fn render(
        &self,
        format: ReportFormat,
        set: &ReconciledFindingSet,
        scores: &ScoreCard,
        metadata: &RunMetadata,
    ) -> Result<Report, AnalysisError> {
        if let Some((field, value)) = scores.out_of_range() {
            return Err(AnalysisError::ReportGenerationFailure {
                format: format.to_string(),
                reason: format!("score '{}' is {}, expected 0-100", field, value),
            });
        }

        Ok(match format {
            ReportFormat::Executive => Report::Executive(self.executive(set, scores, metadata)),
            ReportFormat::Technical => Report::Technical(self.technical(set, scores, metadata)),
            ReportFormat::MachineReadable => {
                Report::MachineReadable(Box::new(self.machine_readable(set, scores, metadata)))
            }
            ReportFormat::RiskMatrix => Report::RiskMatrix(self.risk_matrix(set, scores, metadata)),
            ReportFormat::Statistics => Report::Statistics(self.statistics(set, metadata)),
        })
    }

    fn ranked<'a>(&self, findings: impl Iterator<Item = &'a Finding>) -> Vec<&'a Finding> {
        let mut ranked: Vec<&Finding> = findings.collect();
        self.ranking.sort_by_rank(&mut ranked, |f| f.severity);
        ranked
    }

    fn summary_text(set: &ReconciledFindingSet, scores: &ScoreCard, metadata: &RunMetadata) -> String {
        let b = &scores.breakdown;
        format!(
            "{} scored {}/100 ({}). {} findings: {} critical, {} high, {} medium, {} low, {} informational. Verification: {}.",
            metadata.contract_name,
            scores.overall,
            scores.risk_level,
            b.total(),
            b.critical,
            b.high,
            b.medium,
            b.low,
            b.info,
            set.verification_status.as_str()
        )
    }

    fn executive(
        &self,
        set: &ReconciledFindingSet,
        scores: &ScoreCard,
        metadata: &RunMetadata,
    ) -> ExecutiveReport {
        let ranked = self.ranked(set.all_findings());
        let key_findings = ranked
            .iter()
            .take(self.key_findings_limit)
            .map(|f| KeyFinding {
                severity: f.severity,
                title: f.title.clone(),
                impact: text_or(f.impact.as_deref(), UNKNOWN_IMPACT),
            })
            .collect();

        let top_recommendations = self
            .recommendations(set)
            .into_iter()
            .take(self.key_findings_limit)
            .map(|r| r.action)
            .collect();

        ExecutiveReport {
            contract_name: metadata.contract_name.clone(),
            overall_score: scores.overall,
            risk_level: scores.risk_level,
            summary: Self::summary_text(set, scores, metadata),
            finding_counts: scores.breakdown,
            key_findings,
            top_recommendations,
            verification_status: set.verification_status,
            consensus_score: set.consensus_score,
            provider_success_rate: metadata.provider_success_rate,
        }
    }

    fn technical(
        &self,
        set: &ReconciledFindingSet,
        scores: &ScoreCard,
        metadata: &RunMetadata,
    ) -> TechnicalReport {
        TechnicalReport {
            contract_name: metadata.contract_name.clone(),
            scores: scores.clone(),
            findings: set.findings.iter().map(detail).collect(),
            pattern_findings: set.pattern_findings.iter().map(detail).collect(),
            pattern_coverage: set.pattern_coverage.clone(),
            consensus_groups: set.consensus_groups.iter().map(group_summary).collect(),
            conflicts: set.conflicts.clone(),
            verification_status: set.verification_status,
            consensus_score: set.consensus_score,
            fallback_reason: set.fallback_reason.clone(),
        }
    }

    fn risk_matrix(
        &self,
        set: &ReconciledFindingSet,
        scores: &ScoreCard,
        metadata: &RunMetadata,
    ) -> RiskMatrixReport {
        let cells = self
            .ranking
            .levels()
            .iter()
            .map(|&severity| {
                let findings: Vec<String> = set
                    .all_findings()
                    .filter(|f| f.severity == severity)
                    .map(|f| f.title.clone())
                    .collect();
                let (likelihood, business_impact) = self.risk_table.lookup(severity);
                RiskCell {
                    severity,
                    count: findings.len(),
                    likelihood: likelihood.to_string(),
                    business_impact: business_impact.to_string(),
                    findings,
                }
            })
            .collect();

        RiskMatrixReport {
            contract_name: metadata.contract_name.clone(),
            risk_level: scores.risk_level,
            cells,
        }
    }

    fn statistics(&self, set: &ReconciledFindingSet, metadata: &RunMetadata) -> StatisticsReport {
        let mut by_category = CategoryBreakdown::default();
        let mut by_origin: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_findings = 0;
        for finding in set.all_findings() {
            total_findings += 1;
            match finding.category {
                FindingCategory::Security => by_category.security += 1,
                FindingCategory::GasOptimization => by_category.gas_optimization += 1,
                FindingCategory::CodeQuality => by_category.code_quality += 1,
            }
            *by_origin.entry(finding.origin.to_string()).or_insert(0) += 1;
        }

        StatisticsReport {
            contract_name: metadata.contract_name.clone(),
            total_findings,
            by_severity: set.all_findings().collect(),
            by_category,
            by_origin,
            consensus: ConsensusStatistics::from_groups(&set.consensus_groups),
            pattern_coverage: set.pattern_coverage.percentage,
            providers_succeeded: metadata.providers_succeeded.len(),
            providers_failed: metadata.providers_failed.len(),
            provider_success_rate: metadata.provider_success_rate,
            timings: metadata.timings.clone(),
        }
    }

    fn machine_readable(
        &self,
        set: &ReconciledFindingSet,
        scores: &ScoreCard,
        metadata: &RunMetadata,
    ) -> MachineReadableReport {
        let mut findings = CategorizedFindings::default();
        for finding in &set.findings {
            let bucket = match finding.category {
                FindingCategory::Security => &mut findings.security,
                FindingCategory::GasOptimization => &mut findings.gas_optimization,
                FindingCategory::CodeQuality => &mut findings.code_quality,
            };
            bucket.push(detail(finding));
        }
        findings.patterns = set.pattern_findings.iter().map(detail).collect();

        MachineReadableReport {
            metadata: metadata.clone(),
            generated_at: Utc::now(),
            executive_summary: ExecutiveSummary {
                overall_score: scores.overall,
                risk_level: scores.risk_level,
                total_findings: scores.breakdown.total(),
                verification_status: set.verification_status,
                summary: Self::summary_text(set, scores, metadata),
            },
            scores: scores.clone(),
            findings,
            risk_assessment: RiskAssessment {
                risk_level: scores.risk_level,
                consensus_risk_label: set.risk_label.clone(),
                consensus_score: set.consensus_score,
                average_provider_score: set.average_score,
                conflicts: set.conflicts.clone(),
            },
            recommendations: self.recommendations(set),
            technical_details: TechnicalDetails {
                pattern_coverage: set.pattern_coverage.clone(),
                consensus_groups: set.consensus_groups.iter().map(group_summary).collect(),
                verification_status: set.verification_status,
                fallback_reason: set.fallback_reason.clone(),
                timings: metadata.timings.clone(),
            },
            compliance: compliance(set, scores),
        }
    }

    /// One entry per distinct recommendation, most severe first.
    fn recommendations(&self, set: &ReconciledFindingSet) -> Vec<Recommendation> {
        let mut seen = HashSet::new();
        self.ranked(set.all_findings())
            .into_iter()
            .filter_map(|f| {
                let action = f.recommendation.as_deref()?.trim();
                if action.is_empty() || !seen.insert(action.to_lowercase()) {
                    return None;
                }
                Some(Recommendation {
                    priority: f.severity,
                    title: f.title.clone(),
                    action: action.to_string(),
                })
            })
            .collect()
    }
}

fn text_or(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn detail(finding: &Finding) -> FindingDetail {
    let location = finding.location_label();
    FindingDetail {
        severity: finding.severity,
        category: finding.category,
        title: finding.title.clone(),
        description: text_or(Some(&finding.description), NO_DESCRIPTION),
        location: text_or(Some(&location), UNKNOWN_LOCATION),
        impact: text_or(finding.impact.as_deref(), UNKNOWN_IMPACT),
        recommendation: text_or(finding.recommendation.as_deref(), NO_RECOMMENDATION),
        confidence: finding.confidence,
        origin: finding.origin.to_string(),
        verified: finding.verified,
    }
}

fn group_summary(group: &ConsensusGroup) -> GroupSummary {
    GroupSummary {
        signature: group.signature.clone(),
        severity: group.severity,
        title: group.title.clone(),
        consensus_count: group.consensus_count,
        consensus_percentage: group.consensus_percentage,
        providers: group.providers.clone(),
    }
}

fn mentions(set: &ReconciledFindingSet, keywords: &[&str], pattern_category: &str) -> usize {
    let by_title = set
        .all_findings()
        .filter(|f| {
            let title = f.title.to_lowercase();
            keywords.iter().any(|k| title.contains(k))
        })
        .count();
    let by_pattern = set
        .pattern_coverage
        .triggered_categories
        .iter()
        .filter(|c| c.as_str() == pattern_category)
        .count();
    by_title.max(by_pattern)
}

fn check(id: &str, description: &str, passed: bool, detail: String) -> ComplianceCheck {
    ComplianceCheck {
        id: id.to_string(),
        description: description.to_string(),
        passed,
        detail,
    }
}

/// Fixed checklist evaluated against the findings and scores.
pub fn compliance(set: &ReconciledFindingSet, scores: &ScoreCard) -> Compliance {
    let critical = scores.breakdown.critical;
    let unresolved_high = set
        .all_findings()
        .filter(|f| f.severity == Severity::High)
        .count();
    let access = mentions(
        set,
        &["access control", "tx.origin", "authorization", "unprotected"],
        "access-control",
    );
    let reentrancy = mentions(set, &["reentran", "re-entran"], "reentrancy");
    let consensus_reached = set.verification_status == VerificationStatus::SupervisorVerified
        || set.consensus_score >= 0.6;

    let checks = vec![
        check(
            "no-critical-findings",
            "No critical findings",
            critical == 0,
            format!("{} critical finding(s)", critical),
        ),
        check(
            "no-unresolved-high",
            "No unresolved high severity findings",
            unresolved_high == 0,
            format!("{} high finding(s)", unresolved_high),
        ),
        check(
            "access-control-reviewed",
            "Access control reviewed without issues",
            access == 0,
            format!("{} access control issue(s)", access),
        ),
        check(
            "reentrancy-reviewed",
            "Reentrancy reviewed without issues",
            reentrancy == 0,
            format!("{} reentrancy issue(s)", reentrancy),
        ),
        check(
            "provider-consensus",
            "Providers reached consensus",
            consensus_reached,
            format!(
                "{} with consensus score {:.2}",
                set.verification_status.as_str(),
                set.consensus_score
            ),
        ),
    ];

    let passed = checks.iter().filter(|c| c.passed).count();
    let total = checks.len();
    Compliance {
        status: if passed == total {
            "COMPLIANT".to_string()
        } else {
            "NON_COMPLIANT".to_string()
        },
        passed,
        total,
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Location, Origin};
    use crate::scoring::ScoringEngine;

    fn sample_set() -> ReconciledFindingSet {
        let findings = vec![
            Finding::new(Origin::Supervisor, Severity::High, "Reentrancy in withdraw", "state after call")
                .with_location(Location::at_line(9).with_function("withdraw"))
                .with_recommendation("Use a reentrancy guard"),
            Finding::new(Origin::Provider("gas".into()), Severity::Low, "Cache array length to save gas", ""),
        ];
        let mut set = ReconciledFindingSet::failed(Vec::new(), "unused");
        set.findings = findings;
        set.verification_status = VerificationStatus::SupervisorVerified;
        set.consensus_score = 0.9;
        set.fallback_reason = None;
        set
    }

    #[test]
    fn test_defaults_are_labeled() {
        let set = sample_set();
        let gas = detail(&set.findings[1]);
        assert_eq!(gas.location, UNKNOWN_LOCATION);
        assert_eq!(gas.impact, UNKNOWN_IMPACT);
        assert_eq!(gas.recommendation, NO_RECOMMENDATION);
        assert_eq!(gas.description, NO_DESCRIPTION);

        let reentrancy = detail(&set.findings[0]);
        assert_eq!(reentrancy.location, "withdraw() line 9");
    }

    #[test]
    fn test_all_requested_formats_rendered() {
        let set = sample_set();
        let scores = ScoringEngine::default().score(set.all_findings());
        let metadata = RunMetadata::detached("Vault");
        let map = ReportSynthesizer::default().synthesize(&set, &scores, &metadata, &ReportFormat::ALL);

        assert_eq!(map.formats(), ReportFormat::ALL.to_vec());
        assert!(map.iter().all(|(_, report)| !report.is_fallback()));

        let machine = map.machine_readable().unwrap();
        assert_eq!(machine.findings.security.len(), 1);
        assert_eq!(machine.findings.gas_optimization.len(), 1);
        assert_eq!(machine.recommendations.len(), 1);
        assert_eq!(machine.compliance.total, 5);
        assert_eq!(machine.compliance.status, "NON_COMPLIANT");
    }

    #[test]
    fn test_risk_matrix_buckets_every_severity() {
        let set = sample_set();
        let scores = ScoringEngine::default().score(set.all_findings());
        let metadata = RunMetadata::detached("Vault");
        let report = ReportSynthesizer::default()
            .render(ReportFormat::RiskMatrix, &set, &scores, &metadata)
            .unwrap();

        match report {
            Report::RiskMatrix(matrix) => {
                assert_eq!(matrix.cells.len(), 5);
                assert_eq!(matrix.cells[0].severity, Severity::Critical);
                assert_eq!(matrix.cells[1].count, 1);
                assert_eq!(matrix.cells[1].likelihood, "Likely");
                assert_eq!(matrix.cells[3].findings, vec!["Cache array length to save gas"]);
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_invalid_scores_produce_fallback_per_format() {
        let set = sample_set();
        let mut scores = ScoringEngine::default().score(set.all_findings());
        scores.security = 250;
        let metadata = RunMetadata::detached("Vault");
        let map = ReportSynthesizer::default().synthesize(
            &set,
            &scores,
            &metadata,
            &[ReportFormat::Executive, ReportFormat::Statistics],
        );

        assert_eq!(map.len(), 2);
        match map.get(ReportFormat::Executive) {
            Some(Report::Fallback(fallback)) => {
                assert_eq!(fallback.requested_format, ReportFormat::Executive);
                assert!(fallback.error.contains("security"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_compliance_passes_clean_run() {
        let mut set = ReconciledFindingSet::failed(Vec::new(), "unused");
        set.verification_status = VerificationStatus::SupervisorVerified;
        let scores = ScoringEngine::default().score(set.all_findings());
        let result = compliance(&set, &scores);
        assert_eq!(result.passed, 5);
        assert_eq!(result.status, "COMPLIANT");
    }
}
