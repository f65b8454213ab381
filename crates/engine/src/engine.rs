use crate::compare::{compare_results, ComparisonReport};
use crate::config::{EngineConfig, GlobalSettings};
use crate::consensus::{
    ConsensusBuilder, ConsensusSupervisor, ReconciledFindingSet, Supervisor, SupervisorReconciler,
};
use crate::core::{
    panic_message, AnalysisError, AnalysisRequest, Finding, Origin, RunMetadata, RunStage,
    RunState, Severity, SeverityRanking, Tier,
};
use crate::patterns::{PatternScanner, PatternTable};
use crate::providers::{
    build_registry, build_supervisor, InstructionTable, ProviderDescriptor, ProviderRegistry,
};
use crate::reports::{ReportFormat, ReportMap, ReportSynthesizer, RiskTable};
use crate::runner::{
    BatchCoordinator, BatchOptions, BatchResult, ProviderDispatcher, ProviderFailure, RunAnalysis,
};
use crate::scoring::{ScoreCard, ScoringEngine, ScoringWeights};
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Outcome of one run. Failed runs have the same shape as successful ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub reconciled_findings: ReconciledFindingSet,

    pub score_card: ScoreCard,

    pub report_map: ReportMap,

    #[serde(default)]
    pub provider_failures: Vec<ProviderFailure>,

    pub metadata: RunMetadata,
}

impl AnalysisResult {
    /// Zeroed scores and a single synthetic finding describing `error`.
    pub fn failed(metadata: RunMetadata, error: &AnalysisError) -> Self {
        let finding = Finding::new(
            Origin::Engine,
            Severity::Info,
            "Analysis failed",
            error.to_string(),
        )
        .with_impact("No analysis results are available for this run")
        .with_recommendation("Resolve the reported error and run the analysis again");

        Self {
            success: false,
            error: Some(error.to_string()),
            reconciled_findings: ReconciledFindingSet::failed(vec![finding], error.kind()),
            score_card: ScoreCard::zeroed(),
            report_map: ReportMap::new(),
            provider_failures: Vec::new(),
            metadata,
        }
    }

    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read result {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse result {}", path.display()))
    }
}

pub struct AnalysisEngineBuilder {
    registry: ProviderRegistry,
    supervisor: Option<Arc<dyn Supervisor>>,
    instructions: InstructionTable,
    patterns: PatternTable,
    ranking: SeverityRanking,
    weights: ScoringWeights,
    risk_table: RiskTable,
    settings: GlobalSettings,
}

impl AnalysisEngineBuilder {
    pub fn with_supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn with_instructions(mut self, instructions: InstructionTable) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_patterns(mut self, patterns: PatternTable) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_ranking(mut self, ranking: SeverityRanking) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_risk_table(mut self, risk_table: RiskTable) -> Self {
        self.risk_table = risk_table;
        self
    }

    pub fn with_settings(mut self, settings: GlobalSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> AnalysisEngine {
        let supervisor = self
            .supervisor
            .unwrap_or_else(|| Arc::new(ConsensusSupervisor));

        AnalysisEngine {
            dispatcher: ProviderDispatcher::new(Arc::new(self.registry))
                .with_min_successes(self.settings.min_successful_providers),
            instructions: self.instructions,
            scanner: Arc::new(
                PatternScanner::new(self.patterns).with_context_lines(self.settings.context_lines),
            ),
            consensus: ConsensusBuilder::new(self.ranking.clone()),
            reconciler: SupervisorReconciler::new(supervisor)
                .with_ranking(self.ranking.clone())
                .with_timeout(self.settings.supervisor_timeout()),
            scoring: ScoringEngine::new(self.weights),
            synthesizer: ReportSynthesizer::new(self.ranking).with_risk_table(self.risk_table),
            settings: self.settings,
        }
    }
}

/// Runs the full pipeline: dispatch, pattern scan, consensus, reconciliation, scoring
/// and report synthesis.
pub struct AnalysisEngine {
    dispatcher: ProviderDispatcher,
    instructions: InstructionTable,
    scanner: Arc<PatternScanner>,
    consensus: ConsensusBuilder,
    reconciler: SupervisorReconciler,
    scoring: ScoringEngine,
    synthesizer: ReportSynthesizer,
    settings: GlobalSettings,
}

impl AnalysisEngine {
    pub fn builder(registry: ProviderRegistry) -> AnalysisEngineBuilder {
        AnalysisEngineBuilder {
            registry,
            supervisor: None,
            instructions: InstructionTable::builtin(),
            patterns: PatternTable::builtin(),
            ranking: SeverityRanking::default(),
            weights: ScoringWeights::default(),
            risk_table: RiskTable::default(),
            settings: GlobalSettings::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let registry = build_registry(config)?;
        let supervisor = build_supervisor(config, &registry)?;
        Ok(Self::builder(registry)
            .with_supervisor(supervisor)
            .with_settings(config.global.clone())
            .build())
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.dispatcher.registry()
    }

    /// Free tier uses a prefix of the registry; premium uses every provider.
    pub fn plan(&self, request: &AnalysisRequest) -> Vec<ProviderDescriptor> {
        let entries = self.registry().entries();
        let limit = match request.options.tier {
            Tier::Free => self.settings.free_tier_provider_limit,
            Tier::Premium => entries.len(),
        };

        entries
            .into_iter()
            .take(limit)
            .map(|entry| ProviderDescriptor {
                id: entry.id().to_string(),
                specialty: entry.specialty,
                instructions: self.instructions.compose(
                    entry.specialty,
                    entry.instructions.as_deref(),
                    request.options.mode,
                    request.options.custom_instructions.as_deref(),
                ),
                timeout: entry.timeout.unwrap_or_else(|| self.settings.provider_timeout()),
            })
            .collect()
    }

    /// Never returns an error or panics: every failure becomes a failed result.
    #[instrument(skip_all, fields(contract = %request.contract_name, tier = %request.options.tier, mode = %request.options.mode))]
    pub async fn run_analysis(&self, request: AnalysisRequest) -> AnalysisResult {
        let started = Instant::now();
        let mut metadata = RunMetadata::new(
            request.contract_name.clone(),
            request.options.tier,
            request.options.mode,
        );
        metadata.lines_of_code = request.lines_of_code();
        let mut state = RunState::new();
        let mut failures = Vec::new();

        let outcome = AssertUnwindSafe(self.execute(&request, &mut state, &mut metadata, &mut failures))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(result)) => {
                info!(
                    score = result.score_card.overall,
                    risk = %result.score_card.risk_level,
                    findings = result.score_card.breakdown.total(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Analysis completed"
                );
                return result;
            }
            Ok(Err(err)) => err,
            Err(payload) => AnalysisError::unexpected(state.current().to_string(), panic_message(&*payload)),
        };

        error!(kind = error.kind(), stage = %state.current(), "Analysis failed: {}", error);
        state.fail();
        metadata.stages = state.trace().to_vec();
        metadata.timings.total_ms = started.elapsed().as_millis() as u64;

        let mut result = AnalysisResult::failed(metadata, &error);
        result.provider_failures = failures;
        result.report_map = self.synthesizer.synthesize(
            &result.reconciled_findings,
            &result.score_card,
            &result.metadata,
            &request.requested_formats(),
        );
        result
    }

    async fn execute(
        &self,
        request: &AnalysisRequest,
        state: &mut RunState,
        metadata: &mut RunMetadata,
        failures: &mut Vec<ProviderFailure>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        state.advance(RunStage::Dispatching)?;
        // Rejected targets fail here, before any provider is invoked.
        request.validate(self.settings.max_target_bytes)?;
        let descriptors = self.plan(request);

        let scanner = Arc::clone(&self.scanner);
        let source = request.content.clone();
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&source));

        let stage = Instant::now();
        let outcome = self.dispatcher.settle(&request.content, &descriptors).await;
        metadata.providers_succeeded = outcome.succeeded_ids();
        metadata.providers_failed = outcome.failed_ids();
        metadata.provider_success_rate = outcome.success_rate;
        failures.extend(outcome.failed.iter().cloned());
        self.dispatcher.require_quorum(&outcome)?;

        let patterns = scan
            .await
            .map_err(|e| AnalysisError::unexpected("pattern-scan", e))?;
        metadata.timings.dispatch_ms = stage.elapsed().as_millis() as u64;

        state.advance(RunStage::Reconciling)?;
        let stage = Instant::now();
        let groups = self.consensus.build(&outcome.successful);
        let reconciled = self
            .reconciler
            .reconcile(&request.content, &outcome.successful, groups)
            .await
            .with_patterns(patterns);
        metadata.timings.reconcile_ms = stage.elapsed().as_millis() as u64;

        state.advance(RunStage::Scoring)?;
        let stage = Instant::now();
        let score_card = self.scoring.score(reconciled.all_findings());
        metadata.timings.scoring_ms = stage.elapsed().as_millis() as u64;

        state.advance(RunStage::Reporting)?;
        let stage = Instant::now();
        metadata.stages = state.trace().to_vec();
        metadata.timings.total_ms = started.elapsed().as_millis() as u64;
        let report_map = self.synthesizer.synthesize(
            &reconciled,
            &score_card,
            metadata,
            &request.requested_formats(),
        );
        metadata.timings.reporting_ms = stage.elapsed().as_millis() as u64;

        state.advance(RunStage::Completed)?;
        metadata.stages = state.trace().to_vec();
        metadata.timings.total_ms = started.elapsed().as_millis() as u64;

        Ok(AnalysisResult {
            success: true,
            error: None,
            reconciled_findings: reconciled,
            score_card,
            report_map,
            provider_failures: std::mem::take(failures),
            metadata: metadata.clone(),
        })
    }

    /// Renders reports from stored findings and scores, outside of a run.
    pub fn generate_reports(
        &self,
        contract_name: &str,
        findings: &ReconciledFindingSet,
        scores: &ScoreCard,
        formats: &[ReportFormat],
    ) -> ReportMap {
        let formats = if formats.is_empty() {
            ReportFormat::DEFAULT_SET.to_vec()
        } else {
            formats.to_vec()
        };
        self.synthesizer
            .synthesize(findings, scores, &RunMetadata::detached(contract_name), &formats)
    }

    pub fn compare_results(&self, previous: &AnalysisResult, current: &AnalysisResult) -> ComparisonReport {
        compare_results(previous, current)
    }

    pub async fn run_batch(&self, requests: Vec<AnalysisRequest>, options: BatchOptions) -> BatchResult {
        BatchCoordinator::new(options).run(self, requests).await
    }

    /// Batch options derived from the engine settings.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::default()
            .with_delay(self.settings.batch_delay())
            .with_top_issues_limit(self.settings.top_issues_limit)
    }
}

#[async_trait]
impl RunAnalysis for AnalysisEngine {
    async fn run_analysis(&self, request: AnalysisRequest) -> AnalysisResult {
        AnalysisEngine::run_analysis(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AnalysisMode;
    use crate::providers::{ScriptedProvider, Specialty};
    use serde_json::json;

    fn registry(count: usize) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for i in 0..count {
            registry.register(
                ScriptedProvider::responding(format!("p{}", i), json!({"findings": [], "score": 90, "riskLevel": "Low"})),
                Specialty::Security,
            );
        }
        registry
    }

    #[test]
    fn test_free_tier_uses_registry_prefix() {
        let engine = AnalysisEngine::builder(registry(6)).build();

        let free = engine.plan(&AnalysisRequest::new("Vault", "contract Vault {}"));
        let ids: Vec<&str> = free.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3"]);

        let premium = engine.plan(&AnalysisRequest::new("Vault", "contract Vault {}").with_tier(Tier::Premium));
        assert_eq!(premium.len(), 6);
    }

    #[test]
    fn test_plan_composes_mode_instructions() {
        let engine = AnalysisEngine::builder(registry(1)).build();
        let request = AnalysisRequest::new("Vault", "contract Vault {}")
            .with_mode(AnalysisMode::Custom)
            .with_custom_instructions("Focus on the withdraw path");

        let plan = engine.plan(&request);
        assert!(plan[0].instructions.ends_with("Focus on the withdraw path"));
        assert_eq!(plan[0].timeout, engine.settings().provider_timeout());
    }

    #[tokio::test]
    async fn test_configured_quorum_below_two_is_ignored() {
        let mut settings = GlobalSettings::default();
        settings.min_successful_providers = 1;
        let engine = AnalysisEngine::builder(registry(1)).with_settings(settings).build();

        let result = engine.run_analysis(AnalysisRequest::new("Vault", "contract Vault {}")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("at least 2 required"));
        assert_eq!(result.metadata.providers_succeeded, vec!["p0"]);
    }

    #[tokio::test]
    async fn test_invalid_target_fails_without_invoking_providers() {
        let provider = Arc::new(ScriptedProvider::responding("a", json!({"score": 90})));
        let mut registry = ProviderRegistry::new();
        registry.register_entry(crate::providers::RegisteredProvider {
            provider: provider.clone(),
            specialty: Specialty::Security,
            timeout: None,
            instructions: None,
        });
        let engine = AnalysisEngine::builder(registry).build();

        let result = engine.run_analysis(AnalysisRequest::new("Empty", "   \n")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid target"));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(
            result.metadata.stages,
            vec![RunStage::Queued, RunStage::Dispatching, RunStage::Failed]
        );
        assert_eq!(result.reconciled_findings.findings[0].title, "Analysis failed");
        assert_eq!(result.reconciled_findings.findings[0].origin, Origin::Engine);
        assert_eq!(result.score_card, ScoreCard::zeroed());
        assert_eq!(result.report_map.formats(), ReportFormat::DEFAULT_SET.to_vec());
    }
}
