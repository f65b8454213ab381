use crate::core::{Finding, FindingCategory, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Critical Risk")]
    CriticalRisk,
    #[serde(rename = "High Risk")]
    HighRisk,
    #[serde(rename = "Medium Risk")]
    MediumRisk,
    #[serde(rename = "Low Risk")]
    LowRisk,
    #[serde(rename = "Safe")]
    Safe,
    /// Only produced for failed runs.
    #[serde(rename = "Unknown")]
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CriticalRisk => "Critical Risk",
            Self::HighRisk => "High Risk",
            Self::MediumRisk => "Medium Risk",
            Self::LowRisk => "Low Risk",
            Self::Safe => "Safe",
            Self::Unknown => "Unknown",
        }
    }

    /// Higher is riskier; `Unknown` sorts below `Safe`.
    pub fn severity_rank(&self) -> u8 {
        match self {
            Self::CriticalRisk => 5,
            Self::HighRisk => 4,
            Self::MediumRisk => 3,
            Self::LowRisk => 2,
            Self::Safe => 1,
            Self::Unknown => 0,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityBreakdown {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

impl<'a> FromIterator<&'a Finding> for SeverityBreakdown {
    fn from_iter<I: IntoIterator<Item = &'a Finding>>(iter: I) -> Self {
        let mut breakdown = Self::default();
        for finding in iter {
            breakdown.add(finding.severity);
        }
        breakdown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    pub security: u8,
    pub gas_optimization: u8,
    pub code_quality: u8,
    pub overall: u8,
    pub breakdown: SeverityBreakdown,
    pub risk_level: RiskLevel,
}

impl ScoreCard {
    /// Score card of a failed run.
    pub fn zeroed() -> Self {
        Self {
            security: 0,
            gas_optimization: 0,
            code_quality: 0,
            overall: 0,
            breakdown: SeverityBreakdown::default(),
            risk_level: RiskLevel::Unknown,
        }
    }

    /// First score outside 0..=100, if any.
    pub fn out_of_range(&self) -> Option<(&'static str, u8)> {
        [
            ("security", self.security),
            ("gasOptimization", self.gas_optimization),
            ("codeQuality", self.code_quality),
            ("overall", self.overall),
        ]
        .into_iter()
        .find(|(_, score)| *score > 100)
    }
}

/// Penalties, baselines and blend weights of the scoring formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub critical_penalty: u32,
    pub high_penalty: u32,
    pub medium_penalty: u32,

    pub gas_baseline: u32,
    pub gas_ceiling: u32,
    pub gas_penalty: u32,
    pub gas_floor: u32,

    pub quality_baseline: u32,
    pub quality_ceiling: u32,
    pub quality_penalty: u32,
    pub quality_floor: u32,

    pub security_weight: f64,
    pub gas_weight: f64,
    pub quality_weight: f64,

    pub safe_threshold: u8,
    pub medium_risk_threshold: u8,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            critical_penalty: 25,
            high_penalty: 15,
            medium_penalty: 8,
            gas_baseline: 85,
            gas_ceiling: 95,
            gas_penalty: 5,
            gas_floor: 60,
            quality_baseline: 90,
            quality_ceiling: 95,
            quality_penalty: 3,
            quality_floor: 60,
            security_weight: 0.6,
            gas_weight: 0.2,
            quality_weight: 0.2,
            safe_threshold: 85,
            medium_risk_threshold: 70,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score<'a>(&self, findings: impl IntoIterator<Item = &'a Finding>) -> ScoreCard {
        let mut breakdown = SeverityBreakdown::default();
        let mut security_counts = SeverityBreakdown::default();
        let mut gas_findings = 0;
        let mut quality_findings = 0;

        for finding in findings {
            breakdown.add(finding.severity);
            // HIGH and CRITICAL always weigh on security, whatever the category.
            if finding.category == FindingCategory::Security || finding.severity >= Severity::High {
                security_counts.add(finding.severity);
            }
            match finding.category {
                FindingCategory::Security => {}
                FindingCategory::GasOptimization => gas_findings += 1,
                FindingCategory::CodeQuality => quality_findings += 1,
            }
        }

        let security = self.security_score(&security_counts);
        let gas_optimization = self.gas_score(gas_findings);
        let code_quality = self.quality_score(quality_findings);

        ScoreCard {
            security,
            gas_optimization,
            code_quality,
            overall: self.overall_score(security, gas_optimization, code_quality),
            breakdown,
            risk_level: self.risk_level(&security_counts, security),
        }
    }

    pub fn security_score(&self, counts: &SeverityBreakdown) -> u8 {
        let w = &self.weights;
        let penalty = counts.critical as i64 * w.critical_penalty as i64
            + counts.high as i64 * w.high_penalty as i64
            + counts.medium as i64 * w.medium_penalty as i64;
        (100 - penalty).clamp(0, 100) as u8
    }

    pub fn gas_score(&self, count: usize) -> u8 {
        let w = &self.weights;
        Self::category_score(count, w.gas_baseline, w.gas_ceiling, w.gas_penalty, w.gas_floor)
    }

    pub fn quality_score(&self, count: usize) -> u8 {
        let w = &self.weights;
        Self::category_score(
            count,
            w.quality_baseline,
            w.quality_ceiling,
            w.quality_penalty,
            w.quality_floor,
        )
    }

    fn category_score(count: usize, baseline: u32, ceiling: u32, penalty: u32, floor: u32) -> u8 {
        let score = if count == 0 {
            baseline as i64
        } else {
            (ceiling as i64 - penalty as i64 * count as i64).max(floor as i64)
        };
        score.clamp(0, 100) as u8
    }

    pub fn overall_score(&self, security: u8, gas: u8, quality: u8) -> u8 {
        let w = &self.weights;
        let blended = w.security_weight * security as f64
            + w.gas_weight * gas as f64
            + w.quality_weight * quality as f64;
        blended.round().clamp(0.0, 100.0) as u8
    }

    /// Decision table, first match wins.
    pub fn risk_level(&self, security_counts: &SeverityBreakdown, security: u8) -> RiskLevel {
        if security_counts.critical > 0 {
            RiskLevel::CriticalRisk
        } else if security_counts.high > 1 {
            RiskLevel::HighRisk
        } else if security_counts.high >= 1 || security < self.weights.medium_risk_threshold {
            RiskLevel::MediumRisk
        } else if security >= self.weights.safe_threshold {
            RiskLevel::Safe
        } else {
            RiskLevel::LowRisk
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Origin;

    fn findings(spec: &[(Severity, FindingCategory)]) -> Vec<Finding> {
        spec.iter()
            .enumerate()
            .map(|(i, (severity, category))| {
                Finding::new(Origin::Pattern, *severity, format!("issue {}", i), "")
                    .with_category(*category)
            })
            .collect()
    }

    #[test]
    fn test_no_findings() {
        let card = ScoringEngine::default().score(&[]);
        assert_eq!(card.security, 100);
        assert_eq!(card.gas_optimization, 85);
        assert_eq!(card.code_quality, 90);
        assert_eq!(card.overall, 95);
        assert_eq!(card.risk_level, RiskLevel::Safe);
    }

    #[test]
    fn test_overall_blend() {
        assert_eq!(ScoringEngine::default().overall_score(80, 85, 90), 83);
    }

    #[test]
    fn test_security_score_is_monotonic() {
        let engine = ScoringEngine::default();
        let mut previous = 100;
        for n in 0..10 {
            let counts = SeverityBreakdown {
                critical: n / 3,
                high: n / 2,
                medium: n,
                ..Default::default()
            };
            let score = engine.security_score(&counts);
            assert!(score <= previous);
            previous = score;
        }
        assert_eq!(
            engine.security_score(&SeverityBreakdown {
                critical: 5,
                ..Default::default()
            }),
            0
        );
    }

    #[test]
    fn test_category_scores() {
        let engine = ScoringEngine::default();
        assert_eq!(engine.gas_score(1), 90);
        assert_eq!(engine.gas_score(10), 60);
        assert_eq!(engine.quality_score(2), 89);
        assert_eq!(engine.quality_score(20), 60);
    }

    #[test]
    fn test_risk_levels() {
        let engine = ScoringEngine::default();
        let critical = findings(&[(Severity::Critical, FindingCategory::Security)]);
        assert_eq!(engine.score(&critical).risk_level, RiskLevel::CriticalRisk);

        let two_high = findings(&[
            (Severity::High, FindingCategory::Security),
            (Severity::High, FindingCategory::Security),
        ]);
        assert_eq!(engine.score(&two_high).risk_level, RiskLevel::HighRisk);

        let one_high = findings(&[(Severity::High, FindingCategory::Security)]);
        assert_eq!(engine.score(&one_high).risk_level, RiskLevel::MediumRisk);

        let mediums = findings(&[
            (Severity::Medium, FindingCategory::Security),
            (Severity::Medium, FindingCategory::Security),
        ]);
        let card = engine.score(&mediums);
        assert_eq!(card.security, 84);
        assert_eq!(card.risk_level, RiskLevel::LowRisk);

        let counts = SeverityBreakdown::default();
        assert_eq!(engine.risk_level(&counts, 90), RiskLevel::Safe);
        assert_eq!(engine.risk_level(&counts, 69), RiskLevel::MediumRisk);
    }

    #[test]
    fn test_minor_non_security_findings_only_count_in_breakdown() {
        let engine = ScoringEngine::default();
        let mixed = findings(&[
            (Severity::Medium, FindingCategory::GasOptimization),
            (Severity::Low, FindingCategory::CodeQuality),
        ]);
        let card = engine.score(&mixed);
        assert_eq!(card.security, 100);
        assert_eq!(card.gas_optimization, 90);
        assert_eq!(card.code_quality, 92);
        assert_eq!(card.breakdown.medium, 1);
        assert_eq!(card.breakdown.total(), 2);
        assert_eq!(card.risk_level, RiskLevel::Safe);
    }

    #[test]
    fn test_severe_findings_weigh_on_security_in_any_category() {
        let engine = ScoringEngine::default();
        let card = engine.score(&findings(&[
            (Severity::High, FindingCategory::GasOptimization),
            (Severity::Low, FindingCategory::CodeQuality),
        ]));
        assert_eq!(card.security, 85);
        assert_eq!(card.gas_optimization, 90);
        assert_eq!(card.risk_level, RiskLevel::MediumRisk);

        let card = engine.score(&findings(&[
            (Severity::Critical, FindingCategory::CodeQuality),
            (Severity::Critical, FindingCategory::GasOptimization),
        ]));
        assert_eq!(card.security, 50);
        assert_eq!(card.risk_level, RiskLevel::CriticalRisk);
    }

    #[test]
    fn test_zeroed_and_range_check() {
        let mut card = ScoreCard::zeroed();
        assert_eq!(card.risk_level, RiskLevel::Unknown);
        assert!(card.out_of_range().is_none());
        card.overall = 140;
        assert_eq!(card.out_of_range(), Some(("overall", 140)));
    }

    #[test]
    fn test_risk_level_serializes_with_label() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::CriticalRisk).unwrap(),
            "\"Critical Risk\""
        );
    }
}
