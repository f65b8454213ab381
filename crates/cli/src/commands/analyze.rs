//! Full multi-provider analysis of a single contract.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use quorum_engine::core::{DirectoryReportStore, FileTargetSource, ReportStore, TargetSource};
use quorum_engine::{AnalysisEngine, AnalysisMode, AnalysisRequest, ReportFormat, Tier};

use super::load_config;
use super::output::{analysis_text, emit, OutputFormat};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Engine configuration (YAML). Falls back to environment variables.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "free")]
    pub tier: Tier,

    #[arg(long, default_value = "normal")]
    pub mode: AnalysisMode,

    /// Extra instructions appended to every provider prompt
    #[arg(long)]
    pub instructions: Option<String>,

    /// Report formats to generate (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub formats: Vec<ReportFormat>,

    #[arg(long)]
    pub risk_matrix: bool,

    #[arg(long)]
    pub statistics: bool,

    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Persist the rendered reports under this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

impl AnalyzeArgs {
    fn contract_name(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Contract".to_string())
    }

    fn request(&self, source: String) -> AnalysisRequest {
        let mut request = AnalysisRequest::new(self.contract_name(), source)
            .with_tier(self.tier)
            .with_mode(self.mode);
        if let Some(ref instructions) = self.instructions {
            request = request.with_custom_instructions(instructions.clone());
        }
        if !self.formats.is_empty() {
            request = request.with_formats(self.formats.clone());
        }
        if self.risk_matrix {
            request = request.with_risk_matrix();
        }
        if self.statistics {
            request = request.with_statistics();
        }
        request
    }
}

pub async fn execute(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let engine = AnalysisEngine::from_config(&config).context("Failed to build analysis engine")?;

    let source = FileTargetSource::new()
        .fetch(&args.input.to_string_lossy())
        .await?;

    if args.format == OutputFormat::Text {
        eprintln!(
            "{} {} with {} provider(s)",
            "Analyzing".bright_blue().bold(),
            args.input.display(),
            engine.registry().len()
        );
    }

    let start = Instant::now();
    let result = engine.run_analysis(args.request(source)).await;

    let rendered = match args.format {
        OutputFormat::Text => analysis_text(&result)?,
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Markdown => result.report_map.to_markdown(),
    };
    emit(&rendered, args.output.as_deref())?;

    if let Some(ref dir) = args.out_dir {
        let location = DirectoryReportStore::new(dir)
            .persist(&result.report_map, &result.metadata)
            .await?;
        eprintln!("{} {}", "Reports saved to".green(), location);
    }

    if args.format == OutputFormat::Text {
        eprintln!("Completed in {:.2}s", start.elapsed().as_secs_f64());
    }

    if !result.success {
        bail!(
            "Analysis of {} failed: {}",
            result.metadata.contract_name,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
