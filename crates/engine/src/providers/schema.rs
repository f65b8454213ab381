use crate::core::{Confidence, Finding, FindingCategory, Location, Origin, Severity};
use crate::providers::{ProviderDescriptor, ProviderError, RawResult, Specialty};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Typed output of one provider that passed normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub provider_id: String,
    pub specialty: Specialty,
    pub findings: Vec<Finding>,
    pub score: Option<f64>,
    pub risk_label: Option<String>,
    pub latency_ms: u64,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Which response layout a provider used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// `{findings, score, riskLevel}`
    Current,
    /// `{vulnerabilities, securityScore, risk}`
    Legacy,
}

impl WireShape {
    pub fn detect(payload: &Value) -> Option<WireShape> {
        let object = payload.as_object()?;
        if ["findings", "score", "riskLevel", "riskLabel"]
            .iter()
            .any(|key| object.contains_key(*key))
        {
            Some(WireShape::Current)
        } else if ["vulnerabilities", "securityScore", "risk"]
            .iter()
            .any(|key| object.contains_key(*key))
        {
            Some(WireShape::Legacy)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentWire {
    #[serde(default)]
    findings: Option<Vec<Value>>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default, alias = "riskLabel")]
    risk_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyWire {
    #[serde(default)]
    vulnerabilities: Option<Vec<Value>>,
    #[serde(default)]
    security_score: Option<Value>,
    #[serde(default)]
    risk: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFinding {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<Value>,
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default, alias = "remediation", alias = "fix")]
    recommendation: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Canonical form both wire shapes are adapted into.
#[derive(Debug, Default)]
struct CanonicalOutput {
    findings: Option<Vec<WireFinding>>,
    score: Option<f64>,
    risk_label: Option<String>,
}

impl CanonicalOutput {
    fn present_fields(&self) -> usize {
        [
            self.findings.is_some(),
            self.score.is_some(),
            self.risk_label.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

fn adapt_current(payload: Value) -> Result<CanonicalOutput, ProviderError> {
    let wire: CurrentWire = serde_json::from_value(payload)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(CanonicalOutput {
        findings: wire.findings.map(parse_findings),
        score: wire.score.as_ref().and_then(parse_score),
        risk_label: non_empty(wire.risk_level),
    })
}

fn adapt_legacy(payload: Value) -> Result<CanonicalOutput, ProviderError> {
    let wire: LegacyWire = serde_json::from_value(payload)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    let findings = wire.vulnerabilities.map(|items| {
        parse_findings(items)
            .into_iter()
            .map(|mut finding| {
                // legacy entries name the issue through `type`
                if finding.title.is_none() {
                    finding.title = finding.kind.take();
                }
                finding
            })
            .collect()
    });
    Ok(CanonicalOutput {
        findings,
        score: wire.security_score.as_ref().and_then(parse_score),
        risk_label: non_empty(wire.risk),
    })
}

fn parse_findings(items: Vec<Value>) -> Vec<WireFinding> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<WireFinding>(item) {
            Ok(finding) => Some(finding),
            Err(e) => {
                debug!("Dropping malformed finding entry: {}", e);
                None
            }
        })
        .collect()
}

fn parse_score(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if raw.is_finite() {
        Some(raw.clamp(0.0, 100.0))
    } else {
        None
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_location(wire: &WireFinding) -> Location {
    let mut location = match wire.location {
        Some(Value::Number(ref n)) => n
            .as_u64()
            .map(|line| Location::at_line(line as usize))
            .unwrap_or_default(),
        Some(Value::String(ref s)) => {
            let trimmed = s.trim();
            let digits = trimmed
                .trim_start_matches("line")
                .trim_start_matches('L')
                .trim();
            match digits.parse::<usize>() {
                Ok(line) => Location::at_line(line),
                Err(_) if trimmed.is_empty() => Location::default(),
                Err(_) => Location::from_reference(trimmed),
            }
        }
        Some(Value::Object(ref map)) => Location {
            line: map
                .get("line")
                .or_else(|| map.get("lineStart"))
                .and_then(Value::as_u64)
                .map(|l| l as usize),
            function: map
                .get("function")
                .and_then(Value::as_str)
                .map(str::to_string),
            reference: map
                .get("file")
                .or_else(|| map.get("reference"))
                .and_then(Value::as_str)
                .map(str::to_string),
            snippet: map
                .get("snippet")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        _ => Location::default(),
    };

    if location.line.is_none() {
        location.line = wire.line.map(|l| l as usize);
    }
    if location.function.is_none() {
        location.function = wire.function.clone();
    }
    location
}

fn parse_category(label: Option<&str>) -> Option<FindingCategory> {
    match label?.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
        "security" => Some(FindingCategory::Security),
        "gas" | "gas-optimization" => Some(FindingCategory::GasOptimization),
        "quality" | "code-quality" => Some(FindingCategory::CodeQuality),
        _ => None,
    }
}

fn into_finding(
    wire: WireFinding,
    descriptor: &ProviderDescriptor,
    fallback_confidence: Confidence,
) -> Option<Finding> {
    let title = non_empty(wire.title.clone())?;
    let severity = wire
        .severity
        .as_deref()
        .map(Severity::from_label)
        .unwrap_or(Severity::Medium);
    let category = parse_category(wire.category.as_deref()).unwrap_or_else(|| {
        FindingCategory::refine(descriptor.specialty.default_category(), severity, &title)
    });
    let confidence = wire
        .confidence
        .as_deref()
        .and_then(Confidence::from_label)
        .unwrap_or(fallback_confidence);
    let location = parse_location(&wire);

    let mut finding = Finding::new(
        Origin::Provider(descriptor.id.clone()),
        severity,
        title,
        wire.description.unwrap_or_default(),
    )
    .with_category(category)
    .with_confidence(confidence)
    .with_location(location);

    if let Some(impact) = non_empty(wire.impact) {
        finding = finding.with_impact(impact);
    }
    if let Some(recommendation) = non_empty(wire.recommendation) {
        finding = finding.with_recommendation(recommendation);
    }
    Some(finding)
}

/// The single validation boundary between raw provider output and the pipeline.
pub fn normalize(
    descriptor: &ProviderDescriptor,
    raw: RawResult,
    latency: Duration,
) -> Result<ProviderResult, ProviderError> {
    let canonical = match WireShape::detect(&raw.payload) {
        Some(WireShape::Current) => adapt_current(raw.payload)?,
        Some(WireShape::Legacy) => adapt_legacy(raw.payload)?,
        None => {
            return Err(ProviderError::InvalidResponse(
                "response carries no findings, score or risk label".to_string(),
            ))
        }
    };

    let present = canonical.present_fields();
    if present == 0 {
        return Err(ProviderError::InvalidResponse(
            "response carries no usable findings, score or risk label".to_string(),
        ));
    }
    let confidence = Confidence::from_present_fields(present);

    let wire_findings = canonical.findings.unwrap_or_default();
    let received = wire_findings.len();
    let findings: Vec<Finding> = wire_findings
        .into_iter()
        .filter_map(|wire| into_finding(wire, descriptor, confidence))
        .collect();
    if findings.len() < received {
        debug!(
            provider = %descriptor.id,
            dropped = received - findings.len(),
            "Dropped findings without a title"
        );
    }

    Ok(ProviderResult {
        provider_id: descriptor.id.clone(),
        specialty: descriptor.specialty,
        findings,
        score: canonical.score,
        risk_label: canonical.risk_label,
        latency_ms: latency.as_millis() as u64,
        confidence,
        model: raw.model,
    })
}

/// Pulls a JSON object out of free-form model output (fenced block or first balanced object).
pub fn extract_json_from_text(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &byte) in text.as_bytes()[start..].iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escape_next = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
