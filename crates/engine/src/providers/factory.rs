use crate::config::{BackendConfig, EngineConfig, GlobalSettings, ProviderConfig, SupervisorConfig};
use crate::consensus::{ConsensusSupervisor, ProviderSupervisor, Supervisor};
use crate::providers::{AnalysisProvider, ProviderRegistry, RegisteredProvider, ScriptedProvider};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Instantiates the backend a provider entry describes.
pub fn create_provider(
    config: &ProviderConfig,
    global: &GlobalSettings,
) -> Result<Arc<dyn AnalysisProvider>> {
    let provider: Arc<dyn AnalysisProvider> = match &config.backend {
        #[cfg(feature = "openai")]
        BackendConfig::OpenAI {
            model,
            api_key,
            base_url,
        } => Arc::new(
            crate::providers::OpenAIProvider::new(
                config.id.clone(),
                model.clone(),
                api_key.clone(),
                base_url.clone(),
            )
            .with_context(|| format!("Failed to create provider '{}'", config.id))?
            .with_sampling(global.temperature, global.max_tokens)
            .with_retries(global.retry_attempts),
        ),
        #[cfg(feature = "openai")]
        BackendConfig::Local { endpoint, model } => Arc::new(
            crate::providers::OpenAIProvider::local(config.id.clone(), endpoint.clone(), model.clone())
                .with_sampling(global.temperature, global.max_tokens)
                .with_retries(global.retry_attempts),
        ),
        #[cfg(not(feature = "openai"))]
        BackendConfig::OpenAI { .. } | BackendConfig::Local { .. } => {
            anyhow::bail!(
                "Provider '{}' needs the 'openai' feature, which this build does not enable",
                config.id
            )
        }
        BackendConfig::Fixture { path } => Arc::new(
            ScriptedProvider::from_fixture(config.id.clone(), path)
                .with_context(|| format!("Failed to create provider '{}'", config.id))?,
        ),
    };
    debug!(provider = %config.id, specialty = %config.specialty, "Provider created");
    Ok(provider)
}

pub fn build_registry(config: &EngineConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for entry in &config.providers {
        let provider = create_provider(entry, &config.global)?;
        registry.register_entry(RegisteredProvider {
            provider,
            specialty: entry.specialty,
            timeout: entry.timeout_seconds.map(Duration::from_secs),
            instructions: entry.instructions.clone(),
        });
    }
    Ok(registry)
}

/// The supervisor provider must already be in the registry.
pub fn build_supervisor(
    config: &EngineConfig,
    registry: &ProviderRegistry,
) -> Result<Arc<dyn Supervisor>> {
    match &config.supervisor {
        SupervisorConfig::Consensus => Ok(Arc::new(ConsensusSupervisor)),
        SupervisorConfig::Provider { provider } => {
            let backend = registry.provider(provider).with_context(|| {
                format!("Supervisor provider '{}' is not registered", provider)
            })?;
            Ok(Arc::new(ProviderSupervisor::new(
                backend,
                config.global.supervisor_timeout(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Specialty;
    use std::io::Write;

    fn fixture_config(dir: &std::path::Path) -> EngineConfig {
        let path = dir.join("security.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"findings": [], "score": 95, "riskLevel": "Low"}}"#).unwrap();

        EngineConfig {
            providers: vec![ProviderConfig {
                id: "security".to_string(),
                specialty: Specialty::Security,
                backend: BackendConfig::Fixture { path },
                timeout_seconds: Some(30),
                instructions: Some("Look only at withdrawals.".to_string()),
            }],
            supervisor: SupervisorConfig::default(),
            global: GlobalSettings::default(),
        }
    }

    #[test]
    fn test_build_registry_from_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config(dir.path());
        let registry = build_registry(&config).unwrap();

        let entry = registry.get("security").unwrap();
        assert_eq!(entry.specialty, Specialty::Security);
        assert_eq!(entry.timeout, Some(Duration::from_secs(30)));
        assert_eq!(entry.instructions.as_deref(), Some("Look only at withdrawals."));
    }

    #[test]
    fn test_missing_fixture_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixture_config(dir.path());
        config.providers[0].backend = BackendConfig::Fixture {
            path: dir.path().join("missing.json"),
        };
        assert!(build_registry(&config).is_err());
    }

    #[test]
    fn test_supervisor_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixture_config(dir.path());
        let registry = build_registry(&config).unwrap();

        assert_eq!(build_supervisor(&config, &registry).unwrap().name(), "consensus");

        config.supervisor = SupervisorConfig::Provider {
            provider: "security".to_string(),
        };
        assert_eq!(build_supervisor(&config, &registry).unwrap().name(), "security");

        config.supervisor = SupervisorConfig::Provider {
            provider: "judge".to_string(),
        };
        assert!(build_supervisor(&config, &registry).is_err());
    }
}
