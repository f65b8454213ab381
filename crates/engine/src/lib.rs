//! Quorum - Multi-Provider Contract Analysis
//!
//! Dispatches a contract to several independent analysis providers, builds consensus over
//! what they report, reconciles it through a supervisor pass and turns the result into
//! scores and reports.

pub mod compare;
pub mod config;
pub mod consensus;
pub mod core;
pub mod engine;
pub mod patterns;
pub mod providers;
pub mod reports;
pub mod runner;
pub mod scoring;

pub use compare::{compare_results, ComparisonReport, Trend};
pub use config::{EngineConfig, GlobalSettings, EXAMPLE_CONFIG};
pub use consensus::{ReconciledFindingSet, VerificationStatus};
pub use core::{
    AnalysisError, AnalysisMode, AnalysisOptions, AnalysisRequest, Finding, RunMetadata, Severity,
    Tier,
};
pub use engine::{AnalysisEngine, AnalysisEngineBuilder, AnalysisResult};
pub use patterns::{PatternScanReport, PatternScanner};
pub use providers::{AnalysisProvider, ProviderRegistry, ScriptedProvider};
pub use reports::{Report, ReportFormat, ReportMap};
pub use runner::{BatchOptions, BatchResult};
pub use scoring::{RiskLevel, ScoreCard, ScoringEngine};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
