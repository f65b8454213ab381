use crate::providers::Specialty;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub global: GlobalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,

    #[serde(default)]
    pub specialty: Specialty,

    #[serde(flatten)]
    pub backend: BackendConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Replaces the specialty instruction text for this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "openai")]
    OpenAI {
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>, // If not provided, use OPENAI_API_KEY env var
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    #[serde(rename = "local")]
    Local { endpoint: String, model: String },
    /// Replays a recorded JSON response; no network access.
    #[serde(rename = "fixture")]
    Fixture { path: PathBuf },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SupervisorConfig {
    /// Verifies the representative of every consensus group.
    #[default]
    Consensus,
    /// Sends the consensus digest to a registered provider for verification.
    Provider { provider: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default = "default_provider_timeout_seconds")]
    pub provider_timeout_seconds: u64,

    #[serde(default = "default_supervisor_timeout_seconds")]
    pub supervisor_timeout_seconds: u64,

    #[serde(default = "default_min_successful_providers")]
    pub min_successful_providers: usize,

    #[serde(default = "default_free_tier_provider_limit")]
    pub free_tier_provider_limit: usize,

    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_max_target_bytes")]
    pub max_target_bytes: usize,

    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    #[serde(default = "default_top_issues_limit")]
    pub top_issues_limit: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_provider_timeout_seconds() -> u64 {
    180
}
fn default_supervisor_timeout_seconds() -> u64 {
    120
}
fn default_min_successful_providers() -> usize {
    2
}
fn default_free_tier_provider_limit() -> usize {
    4
}
fn default_batch_delay_ms() -> u64 {
    2000
}
fn default_max_target_bytes() -> usize {
    512 * 1024
}
fn default_context_lines() -> usize {
    2
}
fn default_top_issues_limit() -> usize {
    10
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_retry_attempts() -> u32 {
    3
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            provider_timeout_seconds: default_provider_timeout_seconds(),
            supervisor_timeout_seconds: default_supervisor_timeout_seconds(),
            min_successful_providers: default_min_successful_providers(),
            free_tier_provider_limit: default_free_tier_provider_limit(),
            batch_delay_ms: default_batch_delay_ms(),
            max_target_bytes: default_max_target_bytes(),
            context_lines: default_context_lines(),
            top_issues_limit: default_top_issues_limit(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl GlobalSettings {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }

    pub fn supervisor_timeout(&self) -> Duration {
        Duration::from_secs(self.supervisor_timeout_seconds)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

fn openai_provider(id: &str, specialty: Specialty) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        specialty,
        backend: BackendConfig::OpenAI {
            model: "gpt-4o".to_string(),
            api_key: None,
            base_url: None,
        },
        timeout_seconds: None,
        instructions: None,
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                openai_provider("security", Specialty::Security),
                openai_provider("gas", Specialty::GasOptimization),
                openai_provider("quality", Specialty::CodeQuality),
                openai_provider("defi", Specialty::DefiEconomics),
                openai_provider("access-control", Specialty::AccessControl),
            ],
            supervisor: SupervisorConfig::default(),
            global: GlobalSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?;
        Ok(config)
    }

    /// Picks the parser from the file extension, YAML unless it ends in `.json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path)?,
            _ => Self::from_yaml_file(path)?,
        };
        config.resolve_relative_paths(path.parent().unwrap_or_else(|| Path::new(".")));
        config.apply_env();
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `QUORUM_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secs) = lookup("QUORUM_PROVIDER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.global.provider_timeout_seconds = secs;
        }

        if let Some(ms) = lookup("QUORUM_BATCH_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.global.batch_delay_ms = ms;
        }

        if let Some(min) = lookup("QUORUM_MIN_PROVIDERS").and_then(|v| v.parse().ok()) {
            self.global.min_successful_providers = min;
        }

        if let Some(model) = lookup("QUORUM_MODEL") {
            for provider in &mut self.providers {
                match provider.backend {
                    BackendConfig::OpenAI {
                        model: ref mut m, ..
                    }
                    | BackendConfig::Local {
                        model: ref mut m, ..
                    } => *m = model.clone(),
                    BackendConfig::Fixture { .. } => {}
                }
            }
        }
    }

    /// Fixture paths in a config file are relative to that file.
    fn resolve_relative_paths(&mut self, base: &Path) {
        for provider in &mut self.providers {
            if let BackendConfig::Fixture { ref mut path } = provider.backend {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub const EXAMPLE_CONFIG: &str = r#"
# Quorum engine configuration

providers:
  - id: security
    specialty: security
    type: openai
    model: gpt-4o
    # api_key: sk-...  # Optional, defaults to OPENAI_API_KEY env var
  - id: gas
    specialty: gas-optimization
    type: openai
    model: gpt-4o-mini
  - id: quality
    specialty: code-quality
    type: openai
    model: gpt-4o-mini
  - id: defi
    specialty: defi-economics
    type: local
    endpoint: http://localhost:11434/v1
    model: llama3.1
  - id: access-control       # premium tier only (free tier uses the first 4)
    specialty: access-control
    type: openai
    model: gpt-4o
    timeout_seconds: 240
    # instructions: "Custom instruction text replacing the specialty default"

supervisor:
  type: consensus
  # type: provider
  # provider: security

global:
  provider_timeout_seconds: 180
  supervisor_timeout_seconds: 120
  min_successful_providers: 2
  free_tier_provider_limit: 4
  batch_delay_ms: 2000
  max_target_bytes: 524288
  context_lines: 2
  top_issues_limit: 10
  temperature: 0.2
  max_tokens: 4000
  retry_attempts: 3
"#;
