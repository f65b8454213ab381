use crate::providers::{AnalysisProvider, ProviderError, RawResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    Respond(Value),
    Fail(String),
    Panic(String),
}

/// In-memory provider replaying a fixed payload. Used by tests and by `fixture` backends.
pub struct ScriptedProvider {
    id: String,
    behavior: Behavior,
    delay: Option<Duration>,
    fail_marker: Option<String>,
    call_count: AtomicUsize,
    received: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn with_behavior(id: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            delay: None,
            fail_marker: None,
            call_count: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(id: impl Into<String>, payload: Value) -> Self {
        Self::with_behavior(id, Behavior::Respond(payload))
    }

    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(id, Behavior::Fail(message.into()))
    }

    pub fn panicking(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(id, Behavior::Panic(message.into()))
    }

    /// Replays the JSON document stored at `path`.
    pub fn from_fixture(id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let payload: Value = serde_json::from_str(&content)
            .with_context(|| format!("Fixture {} is not valid JSON", path.display()))?;
        Ok(Self::responding(id, payload))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails whenever the target text contains `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Instruction payloads received so far, in call order.
    pub fn received_instructions(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        target: &str,
        instructions: &str,
        _time_budget: Duration,
    ) -> Result<RawResult, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.received.lock().push(instructions.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(ref marker) = self.fail_marker {
            if target.contains(marker.as_str()) {
                return Err(ProviderError::ApiError(format!(
                    "{} rejected target containing '{}'",
                    self.id, marker
                )));
            }
        }

        match self.behavior {
            Behavior::Respond(ref payload) => {
                Ok(RawResult::new(payload.clone()).with_model("scripted"))
            }
            Behavior::Fail(ref message) => Err(ProviderError::ApiError(message.clone())),
            Behavior::Panic(ref message) => panic!("{}", message),
        }
    }

    fn model_name(&self) -> Option<&str> {
        Some("scripted")
    }
}
