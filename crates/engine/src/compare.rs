use crate::engine::AnalysisResult;
use crate::scoring::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Stable => write!(f, "stable"),
            Self::Declining => write!(f, "declining"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelChange {
    pub from: RiskLevel,
    pub to: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub previous_run: uuid::Uuid,
    pub current_run: uuid::Uuid,
    /// Overall score, current minus previous.
    pub score_delta: i32,
    /// Finding count, current minus previous.
    pub finding_delta: i64,
    pub new_findings: Vec<String>,
    pub resolved_findings: Vec<String>,
    pub risk_level_change: Option<RiskLevelChange>,
    pub trend: Trend,
}

fn titles(result: &AnalysisResult) -> BTreeSet<String> {
    result
        .reconciled_findings
        .all_findings()
        .map(|f| f.normalized_title())
        .collect()
}

/// Compares two runs of the same target. The trend follows the overall score.
pub fn compare_results(previous: &AnalysisResult, current: &AnalysisResult) -> ComparisonReport {
    let score_delta = current.score_card.overall as i32 - previous.score_card.overall as i32;
    let finding_delta = current.reconciled_findings.all_findings().count() as i64
        - previous.reconciled_findings.all_findings().count() as i64;

    let before = titles(previous);
    let after = titles(current);

    let from = previous.score_card.risk_level;
    let to = current.score_card.risk_level;

    ComparisonReport {
        previous_run: previous.metadata.run_id,
        current_run: current.metadata.run_id,
        score_delta,
        finding_delta,
        new_findings: after.difference(&before).cloned().collect(),
        resolved_findings: before.difference(&after).cloned().collect(),
        risk_level_change: (from != to).then_some(RiskLevelChange { from, to }),
        trend: match score_delta {
            d if d > 0 => Trend::Improving,
            d if d < 0 => Trend::Declining,
            _ => Trend::Stable,
        },
    }
}

impl ComparisonReport {
    pub fn to_markdown(&self) -> String {
        let mut report = String::new();
        report.push_str("# Run Comparison\n\n");
        report.push_str(&format!("**Trend:** {}\n", self.trend));
        report.push_str(&format!("**Score delta:** {:+}\n", self.score_delta));
        report.push_str(&format!("**Finding delta:** {:+}\n", self.finding_delta));
        if let Some(change) = self.risk_level_change {
            report.push_str(&format!("**Risk:** {} -> {}\n", change.from, change.to));
        }
        report.push('\n');

        if !self.new_findings.is_empty() {
            report.push_str("## New Findings\n\n");
            for title in &self.new_findings {
                report.push_str(&format!("- {}\n", title));
            }
            report.push('\n');
        }
        if !self.resolved_findings.is_empty() {
            report.push_str("## Resolved Findings\n\n");
            for title in &self.resolved_findings {
                report.push_str(&format!("- {}\n", title));
            }
            report.push('\n');
        }
        report
    }
}
