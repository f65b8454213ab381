use crate::core::{AnalysisMode, RunStage, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub dispatch_ms: u64,
    pub reconcile_ms: u64,
    pub scoring_ms: u64,
    pub reporting_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub run_id: Uuid,

    pub contract_name: String,

    pub tier: Tier,

    pub mode: AnalysisMode,

    /// `None` when reports were generated outside of a run.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    pub engine_version: String,

    #[serde(default)]
    pub lines_of_code: usize,

    #[serde(default)]
    pub providers_succeeded: Vec<String>,

    #[serde(default)]
    pub providers_failed: Vec<String>,

    /// Fraction (0-1) of dispatched providers that produced a usable result.
    #[serde(default)]
    pub provider_success_rate: f64,

    #[serde(default)]
    pub timings: StageTimings,

    #[serde(default)]
    pub stages: Vec<RunStage>,
}

impl RunMetadata {
    pub fn new(contract_name: impl Into<String>, tier: Tier, mode: AnalysisMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            contract_name: contract_name.into(),
            tier,
            mode,
            started_at: Some(Utc::now()),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            lines_of_code: 0,
            providers_succeeded: Vec::new(),
            providers_failed: Vec::new(),
            provider_success_rate: 0.0,
            timings: StageTimings::default(),
            stages: vec![RunStage::Queued],
        }
    }

    /// Deterministic metadata for reports rendered from stored findings and scores.
    pub fn detached(contract_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::nil(),
            started_at: None,
            stages: Vec::new(),
            ..Self::new(contract_name, Tier::default(), AnalysisMode::default())
        }
    }
}
