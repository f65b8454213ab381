use anyhow::{bail, Context, Result};
use clap::Args;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use quorum_engine::{AnalysisEngine, AnalysisRequest, Tier};

use super::load_config;
use super::output::{batch_text, emit, OutputFormat};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Contract files or directories searched recursively for `.sol` files
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "free")]
    pub tier: Tier,

    /// Pause between contracts, overriding the configured delay
    #[arg(long)]
    pub delay_ms: Option<u64>,

    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn find_solidity_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().is_some_and(|ext| ext == "sol") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn collect_targets(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    for path in paths {
        if path.is_dir() {
            targets.extend(find_solidity_files(path)?);
        } else {
            targets.push(path.clone());
        }
    }
    Ok(targets)
}

pub async fn execute(args: BatchArgs) -> Result<()> {
    let targets = collect_targets(&args.paths)?;
    if targets.is_empty() {
        bail!("No contracts found");
    }

    let mut requests = Vec::with_capacity(targets.len());
    for path in &targets {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        requests.push(AnalysisRequest::new(name, source).with_tier(args.tier));
    }

    let config = load_config(args.config.as_deref())?;
    let engine = AnalysisEngine::from_config(&config).context("Failed to build analysis engine")?;

    let mut options = engine.batch_options();
    if let Some(ms) = args.delay_ms {
        options = options.with_delay(Duration::from_millis(ms));
    }

    if args.format == OutputFormat::Text {
        eprintln!(
            "{} {} contract(s)",
            "Batch analyzing".bright_blue().bold(),
            requests.len()
        );
    }

    let result = engine.run_batch(requests, options).await;

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Text => batch_text(&result)?,
        OutputFormat::Markdown => result
            .items
            .iter()
            .map(|item| item.report_map.to_markdown())
            .collect::<Vec<_>>()
            .join("\n---\n\n"),
    };
    emit(&rendered, args.output.as_deref())
}
