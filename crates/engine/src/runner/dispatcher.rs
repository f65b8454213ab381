use crate::core::{panic_message, AnalysisError};
use crate::providers::{normalize, ProviderDescriptor, ProviderError, ProviderRegistry, ProviderResult, Specialty};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Timeout,
    ProviderError,
    InvalidOutput,
    NotRegistered,
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ProviderError => "provider-error",
            Self::InvalidOutput => "invalid-output",
            Self::NotRegistered => "not-registered",
            Self::Panicked => "panicked",
        }
    }

    fn classify(error: &ProviderError) -> Self {
        match error {
            ProviderError::Timeout(_) => Self::Timeout,
            ProviderError::NotRegistered(_) => Self::NotRegistered,
            e if e.is_invalid_output() => Self::InvalidOutput,
            _ => Self::ProviderError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub provider_id: String,
    pub specialty: Specialty,
    pub kind: FailureKind,
    pub reason: String,
    pub latency_ms: u64,
}

/// Settled outcome of every invocation in one run.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub successful: Vec<ProviderResult>,
    pub failed: Vec<ProviderFailure>,
    pub success_rate: f64,
}

impl DispatchOutcome {
    pub fn attempted(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    pub fn succeeded_ids(&self) -> Vec<String> {
        self.successful.iter().map(|r| r.provider_id.clone()).collect()
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.provider_id.clone()).collect()
    }
}

type Settled = Result<ProviderResult, ProviderFailure>;

/// Fewest successful providers a run can be reconciled from.
pub const MIN_QUORUM: usize = 2;

/// Invokes every planned provider concurrently and waits for all of them to settle.
pub struct ProviderDispatcher {
    registry: Arc<ProviderRegistry>,
    min_successes: usize,
}

impl ProviderDispatcher {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            min_successes: MIN_QUORUM,
        }
    }

    /// Raises the quorum. Values below [`MIN_QUORUM`] are clamped up to it.
    pub fn with_min_successes(mut self, min_successes: usize) -> Self {
        self.min_successes = min_successes.max(MIN_QUORUM);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Settles every invocation, then enforces the minimum number of successes.
    pub async fn dispatch(
        &self,
        target: &str,
        descriptors: &[ProviderDescriptor],
    ) -> Result<DispatchOutcome, AnalysisError> {
        let outcome = self.settle(target, descriptors).await;
        self.require_quorum(&outcome)?;
        Ok(outcome)
    }

    pub fn require_quorum(&self, outcome: &DispatchOutcome) -> Result<(), AnalysisError> {
        if outcome.successful.len() < self.min_successes {
            return Err(AnalysisError::InsufficientProviders {
                succeeded: outcome.successful.len(),
                attempted: outcome.attempted(),
                required: self.min_successes,
            });
        }
        Ok(())
    }

    /// Invokes every descriptor concurrently. Each invocation only races its own timeout.
    #[instrument(skip_all, fields(providers = descriptors.len()))]
    pub async fn settle(&self, target: &str, descriptors: &[ProviderDescriptor]) -> DispatchOutcome {
        let target: Arc<str> = Arc::from(target);
        let mut tasks = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let provider = self.registry.provider(&descriptor.id);
            let descriptor = descriptor.clone();
            let target = Arc::clone(&target);

            tasks.push(tokio::spawn(async move {
                let started = Instant::now();
                let Some(provider) = provider else {
                    return Err(failure(
                        &descriptor,
                        FailureKind::NotRegistered,
                        ProviderError::NotRegistered(descriptor.id.clone()).to_string(),
                        started.elapsed(),
                    ));
                };

                let invocation = provider.invoke(&target, &descriptor.instructions, descriptor.timeout);
                match tokio::time::timeout(descriptor.timeout, invocation).await {
                    Ok(Ok(raw)) => normalize(&descriptor, raw, started.elapsed()).map_err(|e| {
                        failure(&descriptor, FailureKind::classify(&e), e.to_string(), started.elapsed())
                    }),
                    Ok(Err(e)) => Err(failure(
                        &descriptor,
                        FailureKind::classify(&e),
                        e.to_string(),
                        started.elapsed(),
                    )),
                    Err(_) => Err(failure(
                        &descriptor,
                        FailureKind::Timeout,
                        AnalysisError::ProviderTimeout {
                            provider: descriptor.id.clone(),
                            seconds: descriptor.timeout.as_secs(),
                        }
                        .to_string(),
                        started.elapsed(),
                    )),
                }
            }));
        }

        let joined = futures::future::join_all(tasks).await;

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for (descriptor, joined) in descriptors.iter().zip(joined) {
            let settled: Settled = match joined {
                Ok(settled) => settled,
                Err(e) if e.is_panic() => Err(failure(
                    descriptor,
                    FailureKind::Panicked,
                    panic_message(&*e.into_panic()),
                    Duration::ZERO,
                )),
                Err(e) => Err(failure(descriptor, FailureKind::ProviderError, e.to_string(), Duration::ZERO)),
            };

            match settled {
                Ok(result) => {
                    debug!(
                        provider = %result.provider_id,
                        latency_ms = result.latency_ms,
                        findings = result.findings.len(),
                        confidence = %result.confidence,
                        "Provider succeeded"
                    );
                    successful.push(result);
                }
                Err(failure) => {
                    warn!(
                        provider = %failure.provider_id,
                        kind = failure.kind.as_str(),
                        latency_ms = failure.latency_ms,
                        "Provider failed: {}",
                        failure.reason
                    );
                    failed.push(failure);
                }
            }
        }

        let attempted = descriptors.len();
        let success_rate = if attempted == 0 {
            0.0
        } else {
            successful.len() as f64 / attempted as f64
        };

        info!(
            succeeded = successful.len(),
            failed = failed.len(),
            "Dispatch settled"
        );

        DispatchOutcome {
            successful,
            failed,
            success_rate,
        }
    }
}

fn failure(
    descriptor: &ProviderDescriptor,
    kind: FailureKind,
    reason: String,
    latency: Duration,
) -> ProviderFailure {
    ProviderFailure {
        provider_id: descriptor.id.clone(),
        specialty: descriptor.specialty,
        kind,
        reason,
        latency_ms: latency.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Confidence;
    use crate::providers::ScriptedProvider;
    use serde_json::json;

    fn descriptor(id: &str, timeout_ms: u64) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            specialty: Specialty::Security,
            instructions: format!("instructions for {}", id),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn payload() -> serde_json::Value {
        json!({
            "findings": [{"severity": "HIGH", "title": "Reentrancy"}],
            "score": 70,
            "riskLevel": "Medium"
        })
    }

    #[tokio::test]
    async fn test_collects_successes_and_failures() {
        let mut registry = ProviderRegistry::new();
        registry.register(ScriptedProvider::responding("a", payload()), Specialty::Security);
        registry.register(
            ScriptedProvider::responding("b", json!({"findings": []})),
            Specialty::Security,
        );
        registry.register(ScriptedProvider::failing("c", "quota"), Specialty::Security);
        registry.register(
            ScriptedProvider::responding("slow", payload()).with_delay(Duration::from_secs(5)),
            Specialty::Security,
        );
        registry.register(ScriptedProvider::panicking("boom", "kaboom"), Specialty::Security);
        registry.register(ScriptedProvider::responding("junk", json!("not an object")), Specialty::Security);

        let dispatcher = ProviderDispatcher::new(Arc::new(registry));
        let descriptors = vec![
            descriptor("a", 1000),
            descriptor("b", 1000),
            descriptor("c", 1000),
            descriptor("slow", 50),
            descriptor("boom", 1000),
            descriptor("junk", 1000),
            descriptor("ghost", 1000),
        ];

        let outcome = dispatcher.dispatch("contract A {}", &descriptors).await.unwrap();
        assert_eq!(outcome.succeeded_ids(), vec!["a", "b"]);
        assert_eq!(outcome.successful[0].confidence, Confidence::High);
        assert_eq!(outcome.successful[1].confidence, Confidence::Low);

        let kinds: Vec<(String, FailureKind)> = outcome
            .failed
            .iter()
            .map(|f| (f.provider_id.clone(), f.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("c".to_string(), FailureKind::ProviderError),
                ("slow".to_string(), FailureKind::Timeout),
                ("boom".to_string(), FailureKind::Panicked),
                ("junk".to_string(), FailureKind::InvalidOutput),
                ("ghost".to_string(), FailureKind::NotRegistered),
            ]
        );
        assert!((outcome.success_rate - 2.0 / 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_insufficient_providers() {
        let mut registry = ProviderRegistry::new();
        registry.register(ScriptedProvider::responding("a", payload()), Specialty::Security);
        registry.register(ScriptedProvider::failing("b", "down"), Specialty::Security);

        let dispatcher = ProviderDispatcher::new(Arc::new(registry));
        let err = dispatcher
            .dispatch("contract A {}", &[descriptor("a", 1000), descriptor("b", 1000)])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AnalysisError::InsufficientProviders {
                succeeded: 1,
                attempted: 2,
                required: 2
            }
        );
    }

    #[tokio::test]
    async fn test_quorum_cannot_be_lowered_below_two() {
        for requested in [0, 1] {
            let mut registry = ProviderRegistry::new();
            registry.register(ScriptedProvider::responding("a", payload()), Specialty::Security);
            let dispatcher =
                ProviderDispatcher::new(Arc::new(registry)).with_min_successes(requested);
            let err = dispatcher
                .dispatch("contract A {}", &[descriptor("a", 1000)])
                .await
                .unwrap_err();
            assert_eq!(
                err,
                AnalysisError::InsufficientProviders {
                    succeeded: 1,
                    attempted: 1,
                    required: MIN_QUORUM
                }
            );
        }
    }

    #[tokio::test]
    async fn test_each_provider_gets_its_own_instructions() {
        let a = Arc::new(ScriptedProvider::responding("a", payload()));
        let mut registry = ProviderRegistry::new();
        registry.register_entry(crate::providers::RegisteredProvider {
            provider: a.clone(),
            specialty: Specialty::Security,
            timeout: None,
            instructions: None,
        });

        let dispatcher = ProviderDispatcher::new(Arc::new(registry));
        let outcome = dispatcher.settle("contract A {}", &[descriptor("a", 1000)]).await;
        assert_eq!(outcome.succeeded_ids(), vec!["a"]);

        assert_eq!(a.call_count(), 1);
        assert_eq!(a.received_instructions(), vec!["instructions for a"]);
    }
}
