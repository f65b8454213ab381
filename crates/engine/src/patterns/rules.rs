use crate::core::{FindingCategory, Severity};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::warn;

/// A named textual signature with a preassigned severity.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub id: String,
    /// Rule family; coverage is measured over distinct families.
    pub category: String,
    pub name: String,
    pub severity: Severity,
    pub finding_category: FindingCategory,
    pub description: String,
    pub recommendation: String,
    regex: Regex,
}

impl PatternRule {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            id: id.into(),
            category: category.into(),
            name: name.into(),
            severity,
            finding_category: FindingCategory::Security,
            description: String::new(),
            recommendation: String::new(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn with_finding_category(mut self, category: FindingCategory) -> Self {
        self.finding_category = category;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

struct RuleSpec {
    id: &'static str,
    category: &'static str,
    name: &'static str,
    severity: Severity,
    finding_category: FindingCategory,
    pattern: &'static str,
    description: &'static str,
    recommendation: &'static str,
}

const BUILTIN_RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "reentrancy-call-value",
        category: "reentrancy",
        name: "Potential reentrancy via value-bearing call",
        severity: Severity::High,
        finding_category: FindingCategory::Security,
        pattern: r"\.call\{\s*value\s*:",
        description: "Low-level call forwarding ether and all remaining gas. If state is updated after this call, the callee can re-enter the contract.",
        recommendation: "Apply checks-effects-interactions and guard the function with a reentrancy lock.",
    },
    RuleSpec {
        id: "reentrancy-legacy-call-value",
        category: "reentrancy",
        name: "Potential reentrancy via call.value",
        severity: Severity::High,
        finding_category: FindingCategory::Security,
        pattern: r"\.call\.value\(",
        description: "Legacy call.value() forwards all remaining gas to the recipient, allowing re-entry.",
        recommendation: "Update state before the call and use a reentrancy guard.",
    },
    RuleSpec {
        id: "unchecked-external-call",
        category: "unchecked-external-call",
        name: "Unchecked external call",
        severity: Severity::Medium,
        finding_category: FindingCategory::Security,
        pattern: r"(?m)^\s*[\w\.\[\]\(\)]+\.(?:send|call)\s*[\(\{]",
        description: "The return value of a low-level call or send is discarded, so a failed transfer goes unnoticed.",
        recommendation: "Check the returned success flag or use a safe transfer helper.",
    },
    RuleSpec {
        id: "tx-origin-authentication",
        category: "access-control",
        name: "Authorization through tx.origin",
        severity: Severity::High,
        finding_category: FindingCategory::Security,
        pattern: r"tx\.origin\s*==|==\s*tx\.origin",
        description: "tx.origin is used for authorization. A malicious contract called by the owner can pass this check.",
        recommendation: "Use msg.sender for authorization checks.",
    },
    RuleSpec {
        id: "delegatecall",
        category: "delegatecall",
        name: "Delegatecall to external code",
        severity: Severity::High,
        finding_category: FindingCategory::Security,
        pattern: r"\.delegatecall\s*\(",
        description: "delegatecall executes foreign code against this contract's storage.",
        recommendation: "Only delegatecall into trusted, immutable implementations and validate the target.",
    },
    RuleSpec {
        id: "selfdestruct",
        category: "selfdestruct",
        name: "Contract can self-destruct",
        severity: Severity::High,
        finding_category: FindingCategory::Security,
        pattern: r"\b(?:selfdestruct|suicide)\s*\(",
        description: "selfdestruct removes the contract code and forwards its balance.",
        recommendation: "Remove selfdestruct or restrict it behind strict access control.",
    },
    RuleSpec {
        id: "timestamp-dependence",
        category: "timestamp-dependence",
        name: "Block timestamp dependence",
        severity: Severity::Low,
        finding_category: FindingCategory::Security,
        pattern: r"\bblock\.timestamp\b",
        description: "Logic depends on block.timestamp, which validators can shift slightly.",
        recommendation: "Avoid using block.timestamp for precise timing or randomness.",
    },
    RuleSpec {
        id: "weak-randomness",
        category: "weak-randomness",
        name: "Weak randomness from block attributes",
        severity: Severity::Medium,
        finding_category: FindingCategory::Security,
        pattern: r"keccak256\s*\(\s*abi\.encodePacked\s*\([^;]*\bblock\.(?:timestamp|difficulty|prevrandao|number)",
        description: "Randomness derived from block attributes is predictable and can be influenced by validators.",
        recommendation: "Use a verifiable randomness source such as a VRF oracle or commit-reveal.",
    },
    RuleSpec {
        id: "unbounded-loop",
        category: "unbounded-loop",
        name: "Loop without a fixed bound",
        severity: Severity::Low,
        finding_category: FindingCategory::GasOptimization,
        pattern: r"\bwhile\s*\(",
        description: "A while loop has no fixed iteration bound and may exceed the block gas limit.",
        recommendation: "Bound the number of iterations or split the work across transactions.",
    },
    RuleSpec {
        id: "storage-read-in-loop",
        category: "storage-read-in-loop",
        name: "Array length read in loop condition",
        severity: Severity::Info,
        finding_category: FindingCategory::GasOptimization,
        pattern: r"for\s*\([^;]*;[^;]*\.length\s*;",
        description: "The loop condition reads an array length on every iteration.",
        recommendation: "Cache the array length in a local variable before the loop.",
    },
    RuleSpec {
        id: "floating-pragma",
        category: "floating-pragma",
        name: "Floating pragma",
        severity: Severity::Info,
        finding_category: FindingCategory::CodeQuality,
        pattern: r"pragma\s+solidity\s*[\^>~]",
        description: "The compiler version is not pinned.",
        recommendation: "Pin the pragma to the compiler version the contract was tested with.",
    },
];

/// Ordered set of pattern rules. Injected into the scanner so tests can use their own.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    rules: Vec<PatternRule>,
}

impl PatternTable {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Self {
        let mut rules = Vec::with_capacity(BUILTIN_RULES.len());
        for spec in BUILTIN_RULES {
            match PatternRule::new(spec.id, spec.category, spec.name, spec.severity, spec.pattern) {
                Ok(rule) => rules.push(
                    rule.with_finding_category(spec.finding_category)
                        .with_description(spec.description)
                        .with_recommendation(spec.recommendation),
                ),
                Err(e) => warn!(rule = spec.id, "Skipping pattern rule: {}", e),
            }
        }
        Self { rules }
    }

    pub fn with_rule(mut self, rule: PatternRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Distinct rule families in the table.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|r| r.category.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
