use crate::reports::formats::*;

impl Report {
    /// Renders the report as markdown for terminal output or files.
    pub fn to_markdown(&self) -> String {
        match self {
            Report::Executive(r) => executive(r),
            Report::Technical(r) => technical(r),
            Report::MachineReadable(r) => machine_readable(r),
            Report::RiskMatrix(r) => risk_matrix(r),
            Report::Statistics(r) => statistics(r),
            Report::Fallback(r) => fallback(r),
        }
    }
}

impl ReportMap {
    pub fn to_markdown(&self) -> String {
        self.iter()
            .map(|(_, report)| report.to_markdown())
            .collect::<Vec<_>>()
            .join("\n---\n\n")
    }
}

fn finding_section(report: &mut String, heading: &str, findings: &[FindingDetail]) {
    if findings.is_empty() {
        return;
    }
    report.push_str(&format!("## {}\n\n", heading));
    for (i, finding) in findings.iter().enumerate() {
        report.push_str(&format!(
            "### {}. {} {} [{}]\n\n",
            i + 1,
            finding.severity.emoji(),
            finding.title,
            finding.severity
        ));
        report.push_str(&format!("**Category:** {}\n", finding.category));
        report.push_str(&format!("**Location:** {}\n", finding.location));
        report.push_str(&format!(
            "**Source:** {}{}\n\n",
            finding.origin,
            if finding.verified { " (verified)" } else { "" }
        ));
        report.push_str(&format!("{}\n\n", finding.description));
        report.push_str(&format!("**Impact:** {}\n\n", finding.impact));
        report.push_str(&format!("**Recommendation:** {}\n\n", finding.recommendation));
    }
}

fn executive(r: &ExecutiveReport) -> String {
    let mut report = String::new();
    report.push_str(&format!("# Executive Summary: {}\n\n", r.contract_name));
    report.push_str(&format!(
        "**Overall Score:** {}/100 | **Risk:** {}\n\n",
        r.overall_score, r.risk_level
    ));
    report.push_str(&format!("{}\n\n", r.summary));
    report.push_str(&format!(
        "Verification: {} (consensus {:.0}%, providers {:.0}%)\n\n",
        r.verification_status.as_str(),
        r.consensus_score * 100.0,
        r.provider_success_rate * 100.0
    ));

    if !r.key_findings.is_empty() {
        report.push_str("## Key Findings\n\n");
        for finding in &r.key_findings {
            report.push_str(&format!(
                "- {} **{}**: {}\n",
                finding.severity.emoji(),
                finding.title,
                finding.impact
            ));
        }
        report.push('\n');
    }

    if !r.top_recommendations.is_empty() {
        report.push_str("## Recommendations\n\n");
        for (i, rec) in r.top_recommendations.iter().enumerate() {
            report.push_str(&format!("{}. {}\n", i + 1, rec));
        }
        report.push('\n');
    }
    report
}

fn technical(r: &TechnicalReport) -> String {
    let mut report = String::new();
    report.push_str(&format!("# Technical Report: {}\n\n", r.contract_name));
    report.push_str("| Security | Gas | Quality | Overall | Risk |\n");
    report.push_str("|---|---|---|---|---|\n");
    report.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        r.scores.security,
        r.scores.gas_optimization,
        r.scores.code_quality,
        r.scores.overall,
        r.scores.risk_level
    ));

    report.push_str(&format!(
        "Verification: {} (consensus score {:.2})\n",
        r.verification_status.as_str(),
        r.consensus_score
    ));
    if let Some(ref reason) = r.fallback_reason {
        report.push_str(&format!("Fallback reason: {}\n", reason));
    }
    report.push('\n');

    finding_section(&mut report, "Findings", &r.findings);
    finding_section(&mut report, "Pattern Findings", &r.pattern_findings);

    report.push_str(&format!(
        "Pattern coverage: {:.0}% ({} of {} categories)\n\n",
        r.pattern_coverage.percentage,
        r.pattern_coverage.triggered_categories.len(),
        r.pattern_coverage.total_categories
    ));

    if !r.consensus_groups.is_empty() {
        report.push_str("## Consensus\n\n");
        for group in &r.consensus_groups {
            report.push_str(&format!(
                "- [{}] {}: {} provider(s), {:.0}% ({})\n",
                group.severity,
                group.title,
                group.consensus_count,
                group.consensus_percentage,
                group.providers.join(", ")
            ));
        }
        report.push('\n');
    }

    if !r.conflicts.is_empty() {
        report.push_str("## Conflicts\n\n");
        for conflict in &r.conflicts {
            report.push_str(&format!(
                "- risk label: {} -> {} ({})\n",
                conflict.values.join(" / "),
                conflict.resolved,
                conflict.strategy
            ));
        }
        report.push('\n');
    }
    report
}

fn machine_readable(r: &MachineReadableReport) -> String {
    let json = serde_json::to_string_pretty(r).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
    format!("```json\n{}\n```\n", json)
}

fn risk_matrix(r: &RiskMatrixReport) -> String {
    let mut report = String::new();
    report.push_str(&format!("# Risk Matrix: {}\n\n", r.contract_name));
    report.push_str(&format!("**Risk:** {}\n\n", r.risk_level));
    report.push_str("| Severity | Count | Likelihood | Business Impact |\n");
    report.push_str("|---|---|---|---|\n");
    for cell in &r.cells {
        report.push_str(&format!(
            "| {} {} | {} | {} | {} |\n",
            cell.severity.emoji(),
            cell.severity,
            cell.count,
            cell.likelihood,
            cell.business_impact
        ));
    }
    report
}

fn statistics(r: &StatisticsReport) -> String {
    let mut report = String::new();
    report.push_str(&format!("# Statistics: {}\n\n", r.contract_name));
    report.push_str(&format!("- Total findings: {}\n", r.total_findings));
    report.push_str(&format!(
        "- By severity: {} critical, {} high, {} medium, {} low, {} info\n",
        r.by_severity.critical,
        r.by_severity.high,
        r.by_severity.medium,
        r.by_severity.low,
        r.by_severity.info
    ));
    report.push_str(&format!(
        "- By category: {} security, {} gas, {} quality\n",
        r.by_category.security, r.by_category.gas_optimization, r.by_category.code_quality
    ));
    for (origin, count) in &r.by_origin {
        report.push_str(&format!("- From {}: {}\n", origin, count));
    }
    report.push_str(&format!(
        "- Consensus groups: {} of {} (average agreement {:.0}%)\n",
        r.consensus.consensus_groups, r.consensus.total_groups, r.consensus.average_agreement
    ));
    report.push_str(&format!("- Pattern coverage: {:.0}%\n", r.pattern_coverage));
    report.push_str(&format!(
        "- Providers: {} succeeded, {} failed ({:.0}%)\n",
        r.providers_succeeded,
        r.providers_failed,
        r.provider_success_rate * 100.0
    ));
    report.push_str(&format!("- Total time: {}ms\n", r.timings.total_ms));
    report
}

fn fallback(r: &FallbackReport) -> String {
    format!(
        "# {} report unavailable: {}\n\n{}\n",
        r.requested_format, r.contract_name, r.error
    )
}
