use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Severity {
    /// Most severe first.
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Info => "INFO",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Critical => "🔴",
            Self::High => "🟠",
            Self::Medium => "🟡",
            Self::Low => "🟢",
            Self::Info => "🔵",
        }
    }

    /// Maps free-form severity text from a provider onto one of the five levels.
    ///
    /// Unrecognized text lands on `Medium` so that nothing a provider flagged is silently
    /// downgraded to informational.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" | "crit" | "blocker" => Self::Critical,
            "high" | "severe" | "major" => Self::High,
            "medium" | "moderate" | "med" => Self::Medium,
            "low" | "minor" => Self::Low,
            "info" | "informational" | "note" | "none" | "gas" => Self::Info,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

impl Confidence {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" | "moderate" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Classifies a provider response by how many of its three headline fields
    /// (findings, score, risk label) were present.
    pub fn from_present_fields(present: usize) -> Self {
        match present {
            3.. => Self::High,
            2 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn percentage(&self) -> u8 {
        match self {
            Self::High => 90,
            Self::Medium => 60,
            Self::Low => 30,
        }
    }
}

/// Ordering used whenever findings or groups are presented "most severe first".
///
/// Injected into the consensus builder, the reconciler and the synthesizer instead of being a
/// global table, so tests can substitute their own order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityRanking {
    order: Vec<Severity>,
}

impl SeverityRanking {
    pub fn new(order: Vec<Severity>) -> Self {
        Self { order }
    }

    /// Position of `severity` in the ranking; levels missing from the ranking sort last.
    pub fn rank(&self, severity: Severity) -> usize {
        self.order
            .iter()
            .position(|s| *s == severity)
            .unwrap_or(self.order.len())
    }

    /// Stable sort, so ties keep their arrival order.
    pub fn sort_by_rank<T>(&self, items: &mut [T], severity_of: impl Fn(&T) -> Severity) {
        items.sort_by_key(|item| self.rank(severity_of(item)));
    }

    pub fn levels(&self) -> &[Severity] {
        &self.order
    }
}

impl Default for SeverityRanking {
    fn default() -> Self {
        Self::new(Severity::ALL.to_vec())
    }
}
