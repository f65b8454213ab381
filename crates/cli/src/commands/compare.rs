use anyhow::Result;
use clap::Args;
use colored::*;
use std::path::PathBuf;

use quorum_engine::{compare_results, AnalysisResult, Trend};

use super::output::{emit, OutputFormat};

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Earlier result, as written by `analyze --format json`
    #[arg(value_name = "PREVIOUS")]
    pub previous: PathBuf,

    #[arg(value_name = "CURRENT")]
    pub current: PathBuf,

    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: CompareArgs) -> Result<()> {
    let previous = AnalysisResult::from_json_file(&args.previous)?;
    let current = AnalysisResult::from_json_file(&args.current)?;
    let comparison = compare_results(&previous, &current);

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&comparison)?,
        OutputFormat::Markdown => comparison.to_markdown(),
        OutputFormat::Text => {
            let trend = match comparison.trend {
                Trend::Improving => comparison.trend.to_string().green(),
                Trend::Stable => comparison.trend.to_string().normal(),
                Trend::Declining => comparison.trend.to_string().red(),
            };
            let mut text = format!(
                "Trend: {}\nScore delta: {:+}\nFinding delta: {:+}\n",
                trend, comparison.score_delta, comparison.finding_delta
            );
            if let Some(change) = comparison.risk_level_change {
                text.push_str(&format!("Risk: {} -> {}\n", change.from, change.to));
            }
            for title in &comparison.new_findings {
                text.push_str(&format!("  {} {}\n", "+".red(), title));
            }
            for title in &comparison.resolved_findings {
                text.push_str(&format!("  {} {}\n", "-".green(), title));
            }
            text
        }
    };
    emit(&rendered, args.output.as_deref())
}
