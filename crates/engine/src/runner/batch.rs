use crate::core::{panic_message, AnalysisError, AnalysisRequest, RunMetadata, RunStage, Severity};
use crate::engine::AnalysisResult;
use crate::scoring::RiskLevel;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{info, warn};

/// Anything that can turn one request into a result. Implemented by the engine.
#[async_trait]
pub trait RunAnalysis: Send + Sync {
    async fn run_analysis(&self, request: AnalysisRequest) -> AnalysisResult;
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Pause between consecutive runs; not applied after the last one.
    pub delay: Duration,
    pub top_issues_limit: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            top_issues_limit: 10,
        }
    }
}

impl BatchOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_top_issues_limit(mut self, limit: usize) -> Self {
        self.top_issues_limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedContract {
    pub index: usize,
    pub contract_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopIssue {
    pub title: String,
    pub count: usize,
    pub highest_severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// One result per request, in request order. Failed runs carry a failed result.
    pub items: Vec<AnalysisResult>,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub success_rate: f64,
    pub average_security_score: f64,
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
    pub top_issues: Vec<TopIssue>,
    pub failed_contracts: Vec<FailedContract>,
}

impl BatchResult {
    pub fn from_items(items: Vec<AnalysisResult>, top_issues_limit: usize) -> Self {
        let total = items.len();
        let successes: Vec<&AnalysisResult> = items.iter().filter(|r| r.success).collect();
        let success_count = successes.len();

        let failed_contracts = items
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.success)
            .map(|(index, r)| FailedContract {
                index,
                contract_name: r.metadata.contract_name.clone(),
                reason: r.error.clone().unwrap_or_else(|| "unknown failure".to_string()),
            })
            .collect();

        let average_security_score = if successes.is_empty() {
            0.0
        } else {
            successes
                .iter()
                .map(|r| r.score_card.security as f64)
                .sum::<f64>()
                / success_count as f64
        };

        let mut risk_distribution = BTreeMap::new();
        for result in &items {
            *risk_distribution
                .entry(result.score_card.risk_level)
                .or_insert(0) += 1;
        }

        Self {
            top_issues: top_issues(&successes, top_issues_limit),
            total,
            success_count,
            failure_count: total - success_count,
            success_rate: if total == 0 {
                0.0
            } else {
                success_count as f64 / total as f64
            },
            average_security_score,
            risk_distribution,
            failed_contracts,
            items,
        }
    }
}

/// Most frequent findings across runs, by normalized title. Ties go to the title
/// that sorts first.
fn top_issues(results: &[&AnalysisResult], limit: usize) -> Vec<TopIssue> {
    let mut counts: HashMap<String, (usize, Severity)> = HashMap::new();
    for result in results {
        for finding in result.reconciled_findings.all_findings() {
            let entry = counts
                .entry(finding.normalized_title())
                .or_insert((0, finding.severity));
            entry.0 += 1;
            entry.1 = entry.1.max(finding.severity);
        }
    }

    let mut issues: Vec<TopIssue> = counts
        .into_iter()
        .map(|(title, (count, highest_severity))| TopIssue {
            title,
            count,
            highest_severity,
        })
        .collect();
    issues.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.title.cmp(&b.title)));
    issues.truncate(limit);
    issues
}

/// Runs requests one after another, isolating each run's failure.
#[derive(Debug, Clone, Default)]
pub struct BatchCoordinator {
    options: BatchOptions,
}

impl BatchCoordinator {
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub async fn run(&self, runner: &dyn RunAnalysis, requests: Vec<AnalysisRequest>) -> BatchResult {
        let total = requests.len();
        let mut items = Vec::with_capacity(total);
        info!(total, "Starting batch");

        for (index, request) in requests.into_iter().enumerate() {
            let contract_name = request.contract_name.clone();
            let tier = request.options.tier;
            let mode = request.options.mode;

            let result = match AssertUnwindSafe(runner.run_analysis(request))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => {
                    let error = AnalysisError::BatchItemFailure {
                        index,
                        target: contract_name.clone(),
                        reason: panic_message(&*payload),
                    };
                    let mut metadata = RunMetadata::new(contract_name.clone(), tier, mode);
                    metadata.stages.push(RunStage::Failed);
                    AnalysisResult::failed(metadata, &error)
                }
            };

            if !result.success {
                warn!(
                    index,
                    contract = %contract_name,
                    "Batch item failed: {}",
                    result.error.as_deref().unwrap_or("unknown failure")
                );
            }
            items.push(result);

            if index + 1 < total && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }
        }

        let result = BatchResult::from_items(items, self.options.top_issues_limit);
        info!(
            total = result.total,
            succeeded = result.success_count,
            failed = result.failure_count,
            "Batch finished"
        );
        result
    }
}
