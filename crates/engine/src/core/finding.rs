use crate::core::{Confidence, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    Security,
    GasOptimization,
    CodeQuality,
}

impl FindingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::GasOptimization => "gas-optimization",
            Self::CodeQuality => "code-quality",
        }
    }

    /// Refines a provider's default category from the finding title. HIGH and CRITICAL
    /// findings are always security findings.
    pub fn refine(default: FindingCategory, severity: Severity, title: &str) -> FindingCategory {
        if severity >= Severity::High {
            return FindingCategory::Security;
        }
        let lower = title.to_lowercase();
        if lower.contains("gas") || lower.contains("storage read") || lower.contains("optimiz") {
            FindingCategory::GasOptimization
        } else if lower.contains("naming")
            || lower.contains("pragma")
            || lower.contains("style")
            || lower.contains("documentation")
            || lower.contains("natspec")
            || lower.contains("unused")
        {
            FindingCategory::CodeQuality
        } else {
            default
        }
    }
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a finding came from: a provider id, the pattern scanner or the supervisor pass.
/// `Engine` marks the synthetic finding that describes a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Origin {
    Provider(String),
    Pattern,
    Supervisor,
    Engine,
}

impl From<String> for Origin {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pattern" => Origin::Pattern,
            "supervisor" => Origin::Supervisor,
            "engine" => Origin::Engine,
            _ => Origin::Provider(value),
        }
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Provider(id) => id,
            Origin::Pattern => "pattern".to_string(),
            Origin::Supervisor => "supervisor".to_string(),
            Origin::Engine => "engine".to_string(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Provider(id) => f.write_str(id),
            Origin::Pattern => f.write_str("pattern"),
            Origin::Supervisor => f.write_str("supervisor"),
            Origin::Engine => f.write_str("engine"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Location {
    pub fn at_line(line: usize) -> Self {
        Self {
            line: Some(line),
            ..Default::default()
        }
    }

    pub fn from_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Default::default()
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_none() && self.function.is_none() && self.reference.is_none()
    }

    /// Human-readable form, also used as the location part of the dedup key.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref function) = self.function {
            parts.push(format!("{}()", function.trim_end_matches("()")));
        }
        if let Some(line) = self.line {
            parts.push(format!("line {}", line));
        }
        if parts.is_empty() {
            if let Some(ref reference) = self.reference {
                parts.push(reference.trim().to_string());
            }
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub severity: Severity,

    pub category: FindingCategory,

    pub title: String,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,

    pub confidence: Confidence,

    pub origin: Origin,

    #[serde(default)]
    pub verified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Finding {
    pub fn new(
        origin: Origin,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            severity,
            category: FindingCategory::refine(FindingCategory::Security, severity, &title),
            title,
            description: description.into(),
            location: None,
            impact: None,
            recommendation: None,
            confidence: Confidence::Medium,
            origin,
            verified: false,
            rule_id: None,
        }
    }

    pub fn with_category(mut self, category: FindingCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = if location.is_empty() { None } else { Some(location) };
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Restamps a finding as confirmed by the supervisor pass.
    pub fn into_verified(mut self) -> Self {
        self.origin = Origin::Supervisor;
        self.confidence = Confidence::High;
        self.verified = true;
        self
    }

    /// Consensus signature: `lowercase(severity-title)` with whitespace runs collapsed to hyphens.
    pub fn signature(&self) -> String {
        format!("{}-{}", self.severity.as_str(), self.title)
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn normalized_title(&self) -> String {
        self.title
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn location_label(&self) -> String {
        self.location.as_ref().map(Location::label).unwrap_or_default()
    }

    /// Identity used for reconciliation: severity + title + location.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.severity.as_str(),
            self.normalized_title(),
            self.location_label().to_lowercase()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_collapses_whitespace() {
        let finding = Finding::new(
            Origin::Provider("alpha".into()),
            Severity::High,
            "Reentrancy  in\twithdraw",
            "desc",
        );
        assert_eq!(finding.signature(), "high-reentrancy-in-withdraw");
    }

    #[test]
    fn test_dedup_key_includes_location() {
        let a = Finding::new(Origin::Pattern, Severity::Low, "Floating pragma", "x")
            .with_location(Location::at_line(1));
        let b = Finding::new(Origin::Pattern, Severity::Low, "floating  pragma", "y")
            .with_location(Location::at_line(1));
        let c = Finding::new(Origin::Pattern, Severity::Low, "Floating pragma", "x")
            .with_location(Location::at_line(7));

        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_origin_round_trips_as_plain_string() {
        let json = serde_json::to_string(&Origin::Supervisor).unwrap();
        assert_eq!(json, "\"supervisor\"");

        let parsed: Origin = serde_json::from_str("\"gas-auditor\"").unwrap();
        assert_eq!(parsed, Origin::Provider("gas-auditor".to_string()));

        let parsed: Origin = serde_json::from_str("\"engine\"").unwrap();
        assert_eq!(parsed, Origin::Engine);
    }

    #[test]
    fn test_into_verified_marks_supervisor_origin() {
        let finding = Finding::new(Origin::Provider("a".into()), Severity::Medium, "t", "d")
            .with_confidence(Confidence::Low)
            .into_verified();
        assert_eq!(finding.origin, Origin::Supervisor);
        assert_eq!(finding.confidence, Confidence::High);
        assert!(finding.verified);
    }

    #[test]
    fn test_category_refined_from_title() {
        assert_eq!(
            FindingCategory::refine(
                FindingCategory::Security,
                Severity::Low,
                "Cache array length to save gas"
            ),
            FindingCategory::GasOptimization
        );
        assert_eq!(
            FindingCategory::refine(FindingCategory::Security, Severity::Info, "Floating pragma version"),
            FindingCategory::CodeQuality
        );
        assert_eq!(
            FindingCategory::refine(FindingCategory::Security, Severity::Medium, "Reentrancy"),
            FindingCategory::Security
        );
    }

    #[test]
    fn test_severe_findings_stay_security() {
        assert_eq!(
            FindingCategory::refine(
                FindingCategory::CodeQuality,
                Severity::Critical,
                "Unused return value of token transfer"
            ),
            FindingCategory::Security
        );
        let finding = Finding::new(Origin::Pattern, Severity::High, "Gas griefing locks funds", "");
        assert_eq!(finding.category, FindingCategory::Security);
    }
}
