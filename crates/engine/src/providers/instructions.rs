use crate::core::{AnalysisMode, FindingCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Area a provider is asked to concentrate on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Specialty {
    #[default]
    General,
    Security,
    GasOptimization,
    CodeQuality,
    DefiEconomics,
    AccessControl,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Security => "security",
            Self::GasOptimization => "gas-optimization",
            Self::CodeQuality => "code-quality",
            Self::DefiEconomics => "defi-economics",
            Self::AccessControl => "access-control",
        }
    }

    /// Category given to this specialty's findings before title refinement.
    pub fn default_category(&self) -> FindingCategory {
        match self {
            Self::GasOptimization => FindingCategory::GasOptimization,
            Self::CodeQuality => FindingCategory::CodeQuality,
            _ => FindingCategory::Security,
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider invocation, fully resolved for a run.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: String,
    pub specialty: Specialty,
    pub instructions: String,
    pub timeout: Duration,
}

const RESPONSE_CONTRACT: &str = r#"Respond with a single JSON object and nothing else:
{
  "findings": [
    {
      "severity": "CRITICAL|HIGH|MEDIUM|LOW|INFO",
      "title": "short name of the issue",
      "description": "what is wrong",
      "location": {"line": 42, "function": "withdraw"},
      "impact": "what an attacker or user can cause",
      "recommendation": "how to fix it",
      "confidence": "HIGH|MEDIUM|LOW"
    }
  ],
  "score": 0-100,
  "riskLevel": "Low|Medium|High|Critical"
}"#;

const AGGRESSIVE_DIRECTIVE: &str = "Perform an exhaustive review. Report every issue you can \
substantiate, including low-likelihood attack paths and edge cases, and do not stop after the \
first finding of a kind.";

/// Specialty instruction text plus the mode modifiers applied on top of it.
#[derive(Debug, Clone)]
pub struct InstructionTable {
    base: HashMap<Specialty, String>,
    aggressive_directive: String,
    response_contract: String,
}

impl Default for InstructionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl InstructionTable {
    pub fn builtin() -> Self {
        let mut base = HashMap::new();
        base.insert(
            Specialty::General,
            "You are a smart contract auditor. Review the contract for any security, \
             correctness or efficiency problems."
                .to_string(),
        );
        base.insert(
            Specialty::Security,
            "You are a smart contract security auditor. Focus on exploitable vulnerabilities: \
             reentrancy, unchecked external calls, arithmetic errors, signature replay, \
             front-running and denial of service."
                .to_string(),
        );
        base.insert(
            Specialty::GasOptimization,
            "You are a gas optimization specialist. Identify storage reads in loops, redundant \
             writes, unpacked structs and other patterns that waste gas. Mark pure optimizations \
             as LOW or INFO severity."
                .to_string(),
        );
        base.insert(
            Specialty::CodeQuality,
            "You are a code quality reviewer. Look at naming, documentation, compiler pragma \
             usage, dead code and maintainability concerns."
                .to_string(),
        );
        base.insert(
            Specialty::DefiEconomics,
            "You are a DeFi economics reviewer. Focus on price oracle manipulation, flash loan \
             attacks, rounding in share accounting, MEV exposure and incentive misalignment."
                .to_string(),
        );
        base.insert(
            Specialty::AccessControl,
            "You are an access control reviewer. Verify that privileged functions are guarded, \
             that ownership transfer is safe and that tx.origin is never used for \
             authorization."
                .to_string(),
        );

        Self {
            base,
            aggressive_directive: AGGRESSIVE_DIRECTIVE.to_string(),
            response_contract: RESPONSE_CONTRACT.to_string(),
        }
    }

    pub fn with_instructions(mut self, specialty: Specialty, text: impl Into<String>) -> Self {
        self.base.insert(specialty, text.into());
        self
    }

    pub fn with_aggressive_directive(mut self, text: impl Into<String>) -> Self {
        self.aggressive_directive = text.into();
        self
    }

    pub fn instructions_for(&self, specialty: Specialty) -> &str {
        self.base
            .get(&specialty)
            .or_else(|| self.base.get(&Specialty::General))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Builds the instruction payload sent to a provider.
    ///
    /// `override_text` replaces the specialty text when a provider is configured with its own
    /// instructions. The response contract always follows the base text, then the mode modifier.
    pub fn compose(
        &self,
        specialty: Specialty,
        override_text: Option<&str>,
        mode: AnalysisMode,
        custom_instructions: Option<&str>,
    ) -> String {
        let base = override_text.unwrap_or_else(|| self.instructions_for(specialty));
        let mut payload = format!("{}\n\n{}", base.trim(), self.response_contract);

        match mode {
            AnalysisMode::Normal => {}
            AnalysisMode::Aggressive => {
                payload.push_str("\n\n");
                payload.push_str(&self.aggressive_directive);
            }
            AnalysisMode::Custom => {
                if let Some(custom) = custom_instructions.filter(|c| !c.trim().is_empty()) {
                    payload.push_str("\n\nAdditional instructions from the requester:\n");
                    payload.push_str(custom.trim());
                }
            }
        }

        payload
    }
}
