//! Cross-provider agreement
//!
//! Groups the findings of every successful provider by normalized signature and measures how
//! many providers independently reported each one.

use crate::core::{Finding, Severity, SeverityRanking};
use crate::providers::ProviderResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusGroup {
    pub signature: String,

    /// Severity of the representative (first) member.
    pub severity: Severity,

    pub title: String,

    pub members: Vec<Finding>,

    /// Distinct providers contributing to this group, in arrival order.
    pub providers: Vec<String>,

    pub consensus_count: usize,

    pub consensus_percentage: f64,

    pub is_consensus: bool,
}

impl ConsensusGroup {
    pub fn representative(&self) -> Option<&Finding> {
        self.members.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusStatistics {
    pub total_groups: usize,
    pub consensus_groups: usize,
    pub single_source_groups: usize,
    pub average_agreement: f64,
}

impl ConsensusStatistics {
    pub fn from_groups(groups: &[ConsensusGroup]) -> Self {
        let total_groups = groups.len();
        let consensus_groups = groups.iter().filter(|g| g.is_consensus).count();
        let average_agreement = if total_groups == 0 {
            0.0
        } else {
            let sum: f64 = groups.iter().map(|g| g.consensus_percentage).sum();
            (sum / total_groups as f64 * 100.0).round() / 100.0
        };

        Self {
            total_groups,
            consensus_groups,
            single_source_groups: total_groups - consensus_groups,
            average_agreement,
        }
    }
}

pub struct ConsensusBuilder {
    ranking: SeverityRanking,
}

impl Default for ConsensusBuilder {
    fn default() -> Self {
        Self::new(SeverityRanking::default())
    }
}

impl ConsensusBuilder {
    pub fn new(ranking: SeverityRanking) -> Self {
        Self { ranking }
    }

    /// Groups in first-seen order, then stably sorted by the representative's severity rank.
    pub fn build(&self, results: &[ProviderResult]) -> Vec<ConsensusGroup> {
        let total_providers = results.len();
        let mut groups: Vec<ConsensusGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for result in results {
            for finding in &result.findings {
                let signature = finding.signature();
                let slot = match index.get(&signature) {
                    Some(&slot) => slot,
                    None => {
                        index.insert(signature.clone(), groups.len());
                        groups.push(ConsensusGroup {
                            signature,
                            severity: finding.severity,
                            title: finding.title.clone(),
                            members: Vec::new(),
                            providers: Vec::new(),
                            consensus_count: 0,
                            consensus_percentage: 0.0,
                            is_consensus: false,
                        });
                        groups.len() - 1
                    }
                };

                let group = &mut groups[slot];
                group.members.push(finding.clone());
                if !group.providers.contains(&result.provider_id) {
                    group.providers.push(result.provider_id.clone());
                }
            }
        }

        for group in &mut groups {
            group.consensus_count = group.providers.len();
            group.consensus_percentage = if total_providers == 0 {
                0.0
            } else {
                group.consensus_count as f64 / total_providers as f64 * 100.0
            };
            group.is_consensus = group.consensus_count >= 2;
        }

        self.ranking.sort_by_rank(&mut groups, |g| g.severity);
        groups
    }
}
