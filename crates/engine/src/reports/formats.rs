use crate::consensus::{Conflict, ConsensusStatistics, VerificationStatus};
use crate::core::{Confidence, FindingCategory, RunMetadata, Severity, StageTimings};
use crate::patterns::PatternCoverage;
use crate::scoring::{RiskLevel, ScoreCard, SeverityBreakdown};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Named report representations. Declaration order is the canonical rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    Executive,
    Technical,
    MachineReadable,
    RiskMatrix,
    Statistics,
}

impl ReportFormat {
    pub const DEFAULT_SET: [ReportFormat; 3] = [
        ReportFormat::Executive,
        ReportFormat::Technical,
        ReportFormat::MachineReadable,
    ];

    pub const ALL: [ReportFormat; 5] = [
        ReportFormat::Executive,
        ReportFormat::Technical,
        ReportFormat::MachineReadable,
        ReportFormat::RiskMatrix,
        ReportFormat::Statistics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executive => "executive",
            Self::Technical => "technical",
            Self::MachineReadable => "machine-readable",
            Self::RiskMatrix => "risk-matrix",
            Self::Statistics => "statistics",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "executive" => Ok(Self::Executive),
            "technical" => Ok(Self::Technical),
            "machine-readable" | "json" => Ok(Self::MachineReadable),
            "risk-matrix" => Ok(Self::RiskMatrix),
            "statistics" | "stats" => Ok(Self::Statistics),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

/// Finding as presented in reports, with labeled defaults for anything missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingDetail {
    pub severity: Severity,
    pub category: FindingCategory,
    pub title: String,
    pub description: String,
    pub location: String,
    pub impact: String,
    pub recommendation: String,
    pub confidence: Confidence,
    pub origin: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFinding {
    pub severity: Severity,
    pub title: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub signature: String,
    pub severity: Severity,
    pub title: String,
    pub consensus_count: usize,
    pub consensus_percentage: f64,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveReport {
    pub contract_name: String,
    pub overall_score: u8,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub finding_counts: SeverityBreakdown,
    pub key_findings: Vec<KeyFinding>,
    pub top_recommendations: Vec<String>,
    pub verification_status: VerificationStatus,
    pub consensus_score: f64,
    pub provider_success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalReport {
    pub contract_name: String,
    pub scores: ScoreCard,
    pub findings: Vec<FindingDetail>,
    pub pattern_findings: Vec<FindingDetail>,
    pub pattern_coverage: PatternCoverage,
    pub consensus_groups: Vec<GroupSummary>,
    pub conflicts: Vec<Conflict>,
    pub verification_status: VerificationStatus,
    pub consensus_score: f64,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCell {
    pub severity: Severity,
    pub count: usize,
    pub likelihood: String,
    pub business_impact: String,
    pub findings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMatrixReport {
    pub contract_name: String,
    pub risk_level: RiskLevel,
    pub cells: Vec<RiskCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub security: usize,
    pub gas_optimization: usize,
    pub code_quality: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub contract_name: String,
    pub total_findings: usize,
    pub by_severity: SeverityBreakdown,
    pub by_category: CategoryBreakdown,
    pub by_origin: BTreeMap<String, usize>,
    pub consensus: ConsensusStatistics,
    pub pattern_coverage: f64,
    pub providers_succeeded: usize,
    pub providers_failed: usize,
    pub provider_success_rate: f64,
    pub timings: StageTimings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    pub overall_score: u8,
    pub risk_level: RiskLevel,
    pub total_findings: usize,
    pub verification_status: VerificationStatus,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedFindings {
    pub security: Vec<FindingDetail>,
    pub gas_optimization: Vec<FindingDetail>,
    pub code_quality: Vec<FindingDetail>,
    pub patterns: Vec<FindingDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub consensus_risk_label: String,
    pub consensus_score: f64,
    pub average_provider_score: f64,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Severity,
    pub title: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalDetails {
    pub pattern_coverage: PatternCoverage,
    pub consensus_groups: Vec<GroupSummary>,
    pub verification_status: VerificationStatus,
    pub fallback_reason: Option<String>,
    pub timings: StageTimings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub id: String,
    pub description: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compliance {
    pub status: String,
    pub passed: usize,
    pub total: usize,
    pub checks: Vec<ComplianceCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineReadableReport {
    pub metadata: RunMetadata,
    /// Wall clock at rendering; the only field that differs between identical renders.
    pub generated_at: DateTime<Utc>,
    pub executive_summary: ExecutiveSummary,
    pub scores: ScoreCard,
    pub findings: CategorizedFindings,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<Recommendation>,
    pub technical_details: TechnicalDetails,
    pub compliance: Compliance,
}

/// Stand-in for a report whose renderer failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackReport {
    pub requested_format: ReportFormat,
    pub contract_name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "kebab-case")]
pub enum Report {
    Executive(ExecutiveReport),
    Technical(TechnicalReport),
    MachineReadable(Box<MachineReadableReport>),
    RiskMatrix(RiskMatrixReport),
    Statistics(StatisticsReport),
    Fallback(FallbackReport),
}

impl Report {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Report::Fallback(_))
    }
}

/// Rendered reports keyed by format, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportMap(BTreeMap<ReportFormat, Report>);

impl ReportMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, format: ReportFormat, report: Report) {
        self.0.insert(format, report);
    }

    pub fn get(&self, format: ReportFormat) -> Option<&Report> {
        self.0.get(&format)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReportFormat, &Report)> {
        self.0.iter()
    }

    pub fn formats(&self) -> Vec<ReportFormat> {
        self.0.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn machine_readable(&self) -> Option<&MachineReadableReport> {
        match self.0.get(&ReportFormat::MachineReadable) {
            Some(Report::MachineReadable(report)) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_order_and_parsing() {
        let mut formats = vec![
            ReportFormat::Statistics,
            ReportFormat::Executive,
            ReportFormat::RiskMatrix,
        ];
        formats.sort();
        assert_eq!(
            formats,
            vec![
                ReportFormat::Executive,
                ReportFormat::RiskMatrix,
                ReportFormat::Statistics
            ]
        );
        assert_eq!(
            "machine_readable".parse::<ReportFormat>().unwrap(),
            ReportFormat::MachineReadable
        );
        assert!("pdf".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_report_map_serializes_with_format_keys() {
        let mut map = ReportMap::new();
        map.insert(
            ReportFormat::RiskMatrix,
            Report::Fallback(FallbackReport {
                requested_format: ReportFormat::RiskMatrix,
                contract_name: "Vault".to_string(),
                error: "boom".to_string(),
            }),
        );
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["risk-matrix"]["format"], "fallback");
        assert_eq!(json["risk-matrix"]["error"], "boom");

        let back: ReportMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }
}
