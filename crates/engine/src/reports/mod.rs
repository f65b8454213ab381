pub mod formats;
pub mod markdown;
pub mod synthesizer;

pub use formats::{
    CategorizedFindings, CategoryBreakdown, Compliance, ComplianceCheck, ExecutiveReport,
    ExecutiveSummary, FallbackReport, FindingDetail, GroupSummary, KeyFinding,
    MachineReadableReport, Recommendation, Report, ReportFormat, ReportMap, RiskAssessment,
    RiskCell, RiskMatrixReport, StatisticsReport, TechnicalDetails, TechnicalReport,
};
pub use synthesizer::{compliance, ReportSynthesizer, RiskTable};
