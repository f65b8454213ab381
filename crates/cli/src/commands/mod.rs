//! Command implementations for the quorum CLI
//!
//! `analyze` and `batch` run the full provider pipeline, `scan` is the offline pattern
//! scanner for CI use, and `compare` diffs two saved results.

pub mod analyze;
pub mod batch;
pub mod compare;
pub mod init;
pub mod output;
pub mod scan;

use anyhow::Result;
use quorum_engine::EngineConfig;
use std::path::Path;
use tracing::debug;

/// Configuration from `--config`, else defaults; environment overrides apply in both cases.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };
    debug!(
        providers = config.providers.len(),
        source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "environment".to_string()),
        "Loaded engine configuration"
    );
    Ok(config)
}
