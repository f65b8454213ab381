//! Pattern-only scan. Deterministic and offline; no provider is contacted.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use quorum_engine::PatternScanner;

use super::output::{emit, scan_text, OutputFormat};

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: ScanArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let report = PatternScanner::default().scan(&source);

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Text | OutputFormat::Markdown => {
            scan_text(&args.input.display().to_string(), &report)?
        }
    };
    emit(&rendered, args.output.as_deref())
}
