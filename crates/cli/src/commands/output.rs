use anyhow::Result;
use colored::*;
use quorum_engine::core::{Confidence, Finding};
use quorum_engine::runner::BatchResult;
use quorum_engine::{AnalysisResult, PatternScanReport, RiskLevel, Severity, VerificationStatus};
use std::fmt::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Prints to stdout or writes to `path` when given.
pub fn emit(output: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, output)?;
            eprintln!("{} {}", "Wrote".green(), path.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

pub fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "CRITICAL".red().bold(),
        Severity::High => "HIGH".bright_red(),
        Severity::Medium => "MEDIUM".yellow(),
        Severity::Low => "LOW".bright_yellow(),
        Severity::Info => "INFO".bright_blue(),
    }
}

fn risk_label(risk: RiskLevel) -> ColoredString {
    match risk {
        RiskLevel::CriticalRisk => risk.as_str().red().bold(),
        RiskLevel::HighRisk => risk.as_str().bright_red(),
        RiskLevel::MediumRisk => risk.as_str().yellow(),
        RiskLevel::LowRisk => risk.as_str().bright_yellow(),
        RiskLevel::Safe => risk.as_str().green(),
        RiskLevel::Unknown => risk.as_str().bright_black(),
    }
}

fn confidence_marker(confidence: Confidence) -> ColoredString {
    match confidence {
        Confidence::High => "●●●".green(),
        Confidence::Medium => "●●○".yellow(),
        Confidence::Low => "●○○".bright_black(),
    }
}

fn write_finding(output: &mut String, finding: &Finding) -> Result<()> {
    writeln!(
        output,
        "\n  {} [{}] {} {}",
        "•".bright_white(),
        severity_label(finding.severity),
        finding.title.bright_white().bold(),
        confidence_marker(finding.confidence)
    )?;
    let location = finding.location_label();
    if !location.is_empty() {
        writeln!(output, "    Location: {}", location)?;
    }
    writeln!(
        output,
        "    Source: {}{}",
        finding.origin,
        if finding.verified { " (verified)".green().to_string() } else { String::new() }
    )?;
    if let Some(ref recommendation) = finding.recommendation {
        writeln!(output, "    Fix: {}", recommendation)?;
    }
    Ok(())
}

pub fn analysis_text(result: &AnalysisResult) -> Result<String> {
    let mut output = String::new();
    let meta = &result.metadata;

    writeln!(output, "\n{}", "════════════════════════════════════════".bright_blue())?;
    writeln!(output, "{}", format!("  ANALYSIS: {}", meta.contract_name).bright_blue().bold())?;
    writeln!(output, "{}", "════════════════════════════════════════".bright_blue())?;

    if !result.success {
        writeln!(
            output,
            "\n{} {}",
            "✗ Analysis failed:".red().bold(),
            result.error.as_deref().unwrap_or("unknown error")
        )?;
        return Ok(output);
    }

    let scores = &result.score_card;
    writeln!(
        output,
        "\nOverall {}/100  Security {}  Gas {}  Quality {}",
        scores.overall.to_string().bold(),
        scores.security,
        scores.gas_optimization,
        scores.code_quality
    )?;
    writeln!(output, "Risk: {}", risk_label(scores.risk_level))?;

    let set = &result.reconciled_findings;
    let verification = match set.verification_status {
        VerificationStatus::SupervisorVerified => set.verification_status.as_str().green(),
        VerificationStatus::StatisticalConsensus => set.verification_status.as_str().yellow(),
    };
    writeln!(
        output,
        "Verification: {} (consensus {:.2})",
        verification, set.consensus_score
    )?;
    writeln!(
        output,
        "Providers: {} succeeded, {} failed",
        meta.providers_succeeded.len(),
        meta.providers_failed.len()
    )?;
    for failure in &result.provider_failures {
        writeln!(
            output,
            "  {} {} ({}): {}",
            "⚠".yellow(),
            failure.provider_id,
            failure.kind.as_str(),
            failure.reason
        )?;
    }

    if set.findings.is_empty() && set.pattern_findings.is_empty() {
        writeln!(output, "\n{}", "✨ No issues found!".green())?;
        return Ok(output);
    }

    if !set.findings.is_empty() {
        writeln!(output, "\n{} Findings ({})", "▶".bright_white(), set.findings.len())?;
        writeln!(output, "{}", "─".repeat(40).bright_black())?;
        for finding in &set.findings {
            write_finding(&mut output, finding)?;
        }
    }

    if !set.pattern_findings.is_empty() {
        writeln!(
            output,
            "\n{} Pattern Findings ({}, coverage {:.0}%)",
            "▶".bright_white(),
            set.pattern_findings.len(),
            set.pattern_coverage.percentage
        )?;
        writeln!(output, "{}", "─".repeat(40).bright_black())?;
        for finding in &set.pattern_findings {
            write_finding(&mut output, finding)?;
        }
    }

    Ok(output)
}

pub fn batch_text(result: &BatchResult) -> Result<String> {
    let mut output = String::new();
    writeln!(output, "\n{}", "BATCH SUMMARY".bright_blue().bold())?;
    writeln!(output, "{}", "─".repeat(40).bright_black())?;
    writeln!(
        output,
        "Contracts: {}  Succeeded: {}  Failed: {}  ({:.0}%)",
        result.total,
        result.success_count.to_string().green(),
        result.failure_count.to_string().red(),
        result.success_rate * 100.0
    )?;
    writeln!(output, "Average security score: {:.1}", result.average_security_score)?;

    writeln!(output, "\nRisk distribution:")?;
    for (risk, count) in &result.risk_distribution {
        writeln!(output, "  {}: {}", risk_label(*risk), count)?;
    }

    for item in &result.items {
        let status = if item.success { "✓".green() } else { "✗".red() };
        writeln!(
            output,
            "  {} {} {}/100 {}",
            status,
            item.metadata.contract_name,
            item.score_card.overall,
            item.score_card.risk_level
        )?;
    }

    if !result.top_issues.is_empty() {
        writeln!(output, "\nTop issues:")?;
        for issue in &result.top_issues {
            writeln!(
                output,
                "  {:>3}× [{}] {}",
                issue.count,
                severity_label(issue.highest_severity),
                issue.title
            )?;
        }
    }

    if !result.failed_contracts.is_empty() {
        writeln!(output, "\nFailed:")?;
        for failed in &result.failed_contracts {
            writeln!(output, "  #{} {}: {}", failed.index + 1, failed.contract_name, failed.reason)?;
        }
    }
    Ok(output)
}

pub fn scan_text(name: &str, report: &PatternScanReport) -> Result<String> {
    let mut output = String::new();
    writeln!(output, "{}", format!("Pattern scan: {}", name).bright_blue().bold())?;
    if report.findings.is_empty() {
        writeln!(output, "{}", "✨ No patterns matched".green())?;
    }
    for finding in &report.findings {
        write_finding(&mut output, finding)?;
    }
    writeln!(
        output,
        "\nCoverage: {:.0}% ({} of {} categories)",
        report.coverage.percentage,
        report.coverage.triggered_categories.len(),
        report.coverage.total_categories
    )?;
    Ok(output)
}
