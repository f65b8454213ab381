use crate::consensus::ConsensusGroup;
use crate::core::Finding;
use crate::providers::{
    normalize, AnalysisProvider, ProviderDescriptor, ProviderError, ProviderResult, Specialty,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything the second pass gets to look at.
pub struct SupervisorInput<'a> {
    pub target: &'a str,
    pub results: &'a [ProviderResult],
    pub groups: &'a [ConsensusGroup],
}

/// Proposes the verified finding list for a run.
#[async_trait]
pub trait Supervisor: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(&self, input: &SupervisorInput<'_>) -> Result<Vec<Finding>, ProviderError>;
}

/// Verifies the representative of every group reported by at least two providers.
#[derive(Debug, Clone, Default)]
pub struct ConsensusSupervisor;

#[async_trait]
impl Supervisor for ConsensusSupervisor {
    fn name(&self) -> &str {
        "consensus"
    }

    async fn verify(&self, input: &SupervisorInput<'_>) -> Result<Vec<Finding>, ProviderError> {
        Ok(input
            .groups
            .iter()
            .filter(|g| g.is_consensus)
            .filter_map(|g| g.representative().cloned())
            .map(Finding::into_verified)
            .collect())
    }
}

/// Asks an analysis provider to confirm or reject the digest of what the others reported.
pub struct ProviderSupervisor {
    provider: Arc<dyn AnalysisProvider>,
    time_budget: Duration,
}

impl ProviderSupervisor {
    pub fn new(provider: Arc<dyn AnalysisProvider>, time_budget: Duration) -> Self {
        Self {
            provider,
            time_budget,
        }
    }

    pub fn digest(groups: &[ConsensusGroup], results: &[ProviderResult]) -> String {
        let mut digest = String::new();
        digest.push_str("You are the supervising auditor. Independent reviewers analyzed the ");
        digest.push_str("contract and reported the findings below. Confirm only findings you can ");
        digest.push_str("verify in the source, merge duplicates, and drop false positives. Use the ");
        digest.push_str("same JSON response format as the reviewers.\n\n");

        digest.push_str("Reviewer verdicts:\n");
        for result in results {
            digest.push_str(&format!(
                "- {} ({}): score {}, risk {}\n",
                result.provider_id,
                result.specialty,
                result
                    .score
                    .map(|s| format!("{:.0}", s))
                    .unwrap_or_else(|| "n/a".to_string()),
                result.risk_label.as_deref().unwrap_or("n/a"),
            ));
        }

        digest.push_str("\nReported findings:\n");
        for group in groups {
            let location = group
                .representative()
                .map(Finding::location_label)
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "unknown location".to_string());
            digest.push_str(&format!(
                "- [{}] {} at {} (reported by {}: {})\n",
                group.severity,
                group.title,
                location,
                group.consensus_count,
                group.providers.join(", ")
            ));
        }

        digest.push_str("\nRespond with a single JSON object:\n");
        digest.push_str("{\"findings\": [...], \"score\": 0-100, \"riskLevel\": \"Low|Medium|High|Critical\"}\n");
        digest
    }
}

#[async_trait]
impl Supervisor for ProviderSupervisor {
    fn name(&self) -> &str {
        self.provider.id()
    }

    async fn verify(&self, input: &SupervisorInput<'_>) -> Result<Vec<Finding>, ProviderError> {
        let instructions = Self::digest(input.groups, input.results);
        let started = Instant::now();
        let raw = self
            .provider
            .invoke(input.target, &instructions, self.time_budget)
            .await?;

        let descriptor = ProviderDescriptor {
            id: self.provider.id().to_string(),
            specialty: Specialty::General,
            instructions,
            timeout: self.time_budget,
        };
        let normalized = normalize(&descriptor, raw, started.elapsed())?;

        Ok(normalized
            .findings
            .into_iter()
            .map(Finding::into_verified)
            .collect())
    }
}
