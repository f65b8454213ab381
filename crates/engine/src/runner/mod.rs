pub mod batch;
pub mod dispatcher;

pub use batch::{BatchCoordinator, BatchOptions, BatchResult, FailedContract, RunAnalysis, TopIssue};
pub use dispatcher::{DispatchOutcome, FailureKind, ProviderDispatcher, ProviderFailure, MIN_QUORUM};
