pub mod error;
pub mod finding;
pub mod interfaces;
pub mod metadata;
pub mod request;
pub mod severity;
pub mod state;

pub use error::{panic_message, AnalysisError};
pub use finding::{Finding, FindingCategory, Location, Origin};
pub use interfaces::{DirectoryReportStore, FileTargetSource, ReportStore, TargetSource};
pub use metadata::{RunMetadata, StageTimings};
pub use request::{AnalysisMode, AnalysisOptions, AnalysisRequest, Tier};
pub use severity::{Confidence, Severity, SeverityRanking};
pub use state::{RunStage, RunState};
