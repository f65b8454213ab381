use crate::core::RunMetadata;
use crate::reports::ReportMap;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Retrieves the source text of an analysis target.
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn fetch(&self, identifier: &str) -> Result<String>;
}

/// Persists a rendered report map and returns where it was stored.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn persist(&self, reports: &ReportMap, metadata: &RunMetadata) -> Result<String>;
}

/// Reads targets from the local file system, relative to an optional root.
#[derive(Debug, Clone, Default)]
pub struct FileTargetSource {
    root: Option<PathBuf>,
}

impl FileTargetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, identifier: &str) -> PathBuf {
        match self.root {
            Some(ref root) => root.join(identifier),
            None => PathBuf::from(identifier),
        }
    }
}

#[async_trait]
impl TargetSource for FileTargetSource {
    async fn fetch(&self, identifier: &str) -> Result<String> {
        let path = self.resolve(identifier);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read target {}", path.display()))
    }
}

/// Writes `<dir>/<run id>/<format>.json` plus a `metadata.json` per run.
#[derive(Debug, Clone)]
pub struct DirectoryReportStore {
    dir: PathBuf,
}

impl DirectoryReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ReportStore for DirectoryReportStore {
    async fn persist(&self, reports: &ReportMap, metadata: &RunMetadata) -> Result<String> {
        let run_dir = self.dir.join(metadata.run_id.to_string());
        tokio::fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create {}", run_dir.display()))?;

        for (format, report) in reports.iter() {
            let path = run_dir.join(format!("{}.json", format.as_str()));
            let content = serde_json::to_string_pretty(report)?;
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        let meta_path = run_dir.join("metadata.json");
        tokio::fs::write(&meta_path, serde_json::to_string_pretty(metadata)?)
            .await
            .with_context(|| format!("Failed to write {}", meta_path.display()))?;

        tracing::info!(location = %run_dir.display(), reports = reports.len(), "persisted reports");
        Ok(run_dir.display().to_string())
    }
}
