use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Provider '{0}' is not registered")]
    NotRegistered(String),
}

impl ProviderError {
    /// Whether the provider answered but the answer could not be used.
    pub fn is_invalid_output(&self) -> bool {
        matches!(self, Self::InvalidResponse(_))
    }
}

/// Unparsed provider output, handed to the normalization boundary.
#[derive(Debug, Clone)]
pub struct RawResult {
    pub payload: serde_json::Value,
    pub model: Option<String>,
}

impl RawResult {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// An independent analysis backend. How it reaches a verdict is its own business.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn invoke(
        &self,
        target: &str,
        instructions: &str,
        time_budget: Duration,
    ) -> Result<RawResult, ProviderError>;

    fn model_name(&self) -> Option<&str> {
        None
    }
}
