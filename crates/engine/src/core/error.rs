use thiserror::Error;

/// Failure taxonomy of a single analysis run.
///
/// Only `TargetInvalid`, `InsufficientProviders` and `Unexpected` ever escalate to a failed
/// [`AnalysisResult`](crate::engine::AnalysisResult); the other variants are absorbed by the
/// stage that raised them and only surface in logs and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("invalid target: {0}")]
    TargetInvalid(String),

    #[error("provider '{provider}' timed out after {seconds}s")]
    ProviderTimeout { provider: String, seconds: u64 },

    #[error(
        "insufficient providers: {succeeded} of {attempted} succeeded, at least {required} required"
    )]
    InsufficientProviders {
        succeeded: usize,
        attempted: usize,
        required: usize,
    },

    #[error("reconciliation failed: {0}")]
    ReconciliationFailure(String),

    #[error("report generation failed for '{format}': {reason}")]
    ReportGenerationFailure { format: String, reason: String },

    #[error("batch item {index} ('{target}') failed: {reason}")]
    BatchItemFailure {
        index: usize,
        target: String,
        reason: String,
    },

    #[error("unexpected failure during {stage}: {reason}")]
    Unexpected { stage: String, reason: String },
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TargetInvalid(_) => "TargetInvalid",
            Self::ProviderTimeout { .. } => "ProviderTimeout",
            Self::InsufficientProviders { .. } => "InsufficientProviders",
            Self::ReconciliationFailure(_) => "ReconciliationFailure",
            Self::ReportGenerationFailure { .. } => "ReportGenerationFailure",
            Self::BatchItemFailure { .. } => "BatchItemFailure",
            Self::Unexpected { .. } => "Unexpected",
        }
    }

    /// Whether this error ends the run with a failed result instead of being absorbed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TargetInvalid(_) | Self::InsufficientProviders { .. } | Self::Unexpected { .. }
        )
    }

    pub fn unexpected(stage: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unexpected {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }
}

/// Best-effort text of a panic payload captured with `catch_unwind`.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
