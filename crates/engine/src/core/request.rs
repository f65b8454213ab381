use crate::core::AnalysisError;
use crate::reports::ReportFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            _ => Err(format!("Unknown tier: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Normal,
    Aggressive,
    Custom,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Aggressive => write!(f, "aggressive"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "aggressive" => Ok(Self::Aggressive),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(default)]
    pub tier: Tier,

    #[serde(default)]
    pub mode: AnalysisMode,

    #[serde(default)]
    pub custom_instructions: Option<String>,

    #[serde(default)]
    pub report_formats: Vec<ReportFormat>,

    #[serde(default)]
    pub include_risk_matrix: bool,

    #[serde(default)]
    pub include_statistics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub contract_name: String,

    pub content: String,

    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(contract_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            content: content.into(),
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.options.tier = tier;
        self
    }

    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.options.mode = AnalysisMode::Custom;
        self.options.custom_instructions = Some(instructions.into());
        self
    }

    pub fn with_formats(mut self, formats: Vec<ReportFormat>) -> Self {
        self.options.report_formats = formats;
        self
    }

    pub fn with_risk_matrix(mut self) -> Self {
        self.options.include_risk_matrix = true;
        self
    }

    pub fn with_statistics(mut self) -> Self {
        self.options.include_statistics = true;
        self
    }

    /// Checks run before any provider is contacted.
    pub fn validate(&self, max_target_bytes: usize) -> Result<(), AnalysisError> {
        if self.contract_name.trim().is_empty() {
            return Err(AnalysisError::TargetInvalid(
                "contract name is empty".to_string(),
            ));
        }
        if self.content.trim().is_empty() {
            return Err(AnalysisError::TargetInvalid(format!(
                "'{}' has no source content",
                self.contract_name
            )));
        }
        if self.content.len() > max_target_bytes {
            return Err(AnalysisError::TargetInvalid(format!(
                "'{}' is {} bytes, limit is {}",
                self.contract_name,
                self.content.len(),
                max_target_bytes
            )));
        }
        if self.options.mode == AnalysisMode::Custom
            && self
                .options
                .custom_instructions
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(AnalysisError::TargetInvalid(
                "custom mode requires custom instructions".to_string(),
            ));
        }
        Ok(())
    }

    /// Formats to render: explicit list (or the default set) plus the opt-in extras,
    /// without duplicates, in canonical order.
    pub fn requested_formats(&self) -> Vec<ReportFormat> {
        let mut formats = if self.options.report_formats.is_empty() {
            ReportFormat::DEFAULT_SET.to_vec()
        } else {
            self.options.report_formats.clone()
        };
        if self.options.include_risk_matrix {
            formats.push(ReportFormat::RiskMatrix);
        }
        if self.options.include_statistics {
            formats.push(ReportFormat::Statistics);
        }
        formats.sort();
        formats.dedup();
        formats
    }

    pub fn lines_of_code(&self) -> usize {
        self.content.lines().filter(|l| !l.trim().is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_content() {
        let request = AnalysisRequest::new("Vault", "   \n");
        let err = request.validate(1024).unwrap_err();
        assert!(matches!(err, AnalysisError::TargetInvalid(_)));
    }

    #[test]
    fn test_validate_rejects_oversized_target() {
        let request = AnalysisRequest::new("Vault", "x".repeat(64));
        assert!(request.validate(32).is_err());
        assert!(request.validate(64).is_ok());
    }

    #[test]
    fn test_custom_mode_requires_instructions() {
        let request = AnalysisRequest::new("Vault", "contract Vault {}").with_mode(AnalysisMode::Custom);
        assert!(request.validate(1024).is_err());

        let request = AnalysisRequest::new("Vault", "contract Vault {}")
            .with_custom_instructions("Focus on oracle usage");
        assert!(request.validate(1024).is_ok());
    }

    #[test]
    fn test_requested_formats_defaults_and_extras() {
        let request = AnalysisRequest::new("Vault", "contract Vault {}");
        assert_eq!(request.requested_formats(), ReportFormat::DEFAULT_SET.to_vec());

        let request = AnalysisRequest::new("Vault", "contract Vault {}")
            .with_formats(vec![ReportFormat::Statistics, ReportFormat::Executive])
            .with_statistics()
            .with_risk_matrix();
        assert_eq!(
            request.requested_formats(),
            vec![
                ReportFormat::Executive,
                ReportFormat::RiskMatrix,
                ReportFormat::Statistics
            ]
        );
    }

    #[test]
    fn test_options_deserialize_from_camel_case() {
        let json = r#"{
            "contractName": "Vault",
            "content": "contract Vault {}",
            "options": {
                "tier": "premium",
                "mode": "aggressive",
                "customInstructions": null,
                "reportFormats": ["executive", "machine-readable"],
                "includeRiskMatrix": true,
                "includeStatistics": false
            }
        }"#;
        let request: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.options.tier, Tier::Premium);
        assert_eq!(request.options.mode, AnalysisMode::Aggressive);
        assert!(request.options.include_risk_matrix);
    }
}
