use crate::core::{Confidence, Finding, Location, Origin};
use crate::patterns::{PatternRule, PatternTable};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCoverage {
    pub triggered_categories: Vec<String>,
    pub total_categories: usize,
    /// Triggered families over all families, as a percentage.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternScanReport {
    pub findings: Vec<Finding>,
    pub coverage: PatternCoverage,
}

/// Deterministic rule-based detector over raw source text.
#[derive(Debug, Clone)]
pub struct PatternScanner {
    table: PatternTable,
    context_lines: usize,
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::new(PatternTable::builtin())
    }
}

impl PatternScanner {
    pub fn new(table: PatternTable) -> Self {
        Self {
            table,
            context_lines: 2,
        }
    }

    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    pub fn scan(&self, source: &str) -> PatternScanReport {
        let lines: Vec<&str> = source.lines().collect();

        let per_rule: Vec<Vec<Finding>> = self
            .table
            .rules()
            .par_iter()
            .map(|rule| self.apply_rule(rule, source, &lines))
            .collect();

        let total_categories = self.table.categories().len();
        let mut triggered = BTreeSet::new();
        for (rule, findings) in self.table.rules().iter().zip(per_rule.iter()) {
            if !findings.is_empty() {
                triggered.insert(rule.category.clone());
            }
        }

        let percentage = if total_categories == 0 {
            0.0
        } else {
            let raw = triggered.len() as f64 / total_categories as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        };

        let findings: Vec<Finding> = per_rule.into_iter().flatten().collect();
        debug!(
            findings = findings.len(),
            triggered = triggered.len(),
            "Pattern scan complete"
        );

        PatternScanReport {
            findings,
            coverage: PatternCoverage {
                triggered_categories: triggered.into_iter().collect(),
                total_categories,
                percentage,
            },
        }
    }

    fn apply_rule(&self, rule: &PatternRule, source: &str, lines: &[&str]) -> Vec<Finding> {
        rule.regex()
            .find_iter(source)
            .map(|m| {
                let line = line_number_at(source, m.start());
                let location = Location::at_line(line).with_snippet(self.context(lines, line));

                let mut finding =
                    Finding::new(Origin::Pattern, rule.severity, &rule.name, &rule.description)
                        .with_category(rule.finding_category)
                        .with_confidence(Confidence::Medium)
                        .with_location(location)
                        .with_rule_id(&rule.id);
                if !rule.recommendation.is_empty() {
                    finding = finding.with_recommendation(&rule.recommendation);
                }
                finding
            })
            .collect()
    }

    fn context(&self, lines: &[&str], line: usize) -> String {
        let index = line.saturating_sub(1);
        let start = index.saturating_sub(self.context_lines);
        let end = (index + self.context_lines + 1).min(lines.len());
        if start >= end {
            return String::new();
        }
        lines[start..end].join("\n")
    }
}

/// 1-based line of a byte offset: one plus the newlines before it.
pub fn line_number_at(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}
