//! Advisory assessments.
//!
//! An assessment is advisory data: it is attached to the entity and quoted in
//! audit notes, and only becomes a hard gate where a workflow says so
//! explicitly (high vendor risk requires a recorded risk acceptance).

use crate::backend::{LlmBackend, LlmRequest};
use crate::error::AdvisoryError;
use crate::parse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::{debug, instrument};

/// Upper bound on the length of a model answer.
const ANSWER_TOKEN_LIMIT: u32 = 600;

/// Which question the advisor is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    /// Is this deliverable ready to be paid?
    PaymentReadiness,
    /// How risky is onboarding this vendor?
    VendorRisk,
}

impl fmt::Display for AdvisoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentReadiness => f.write_str("payment readiness"),
            Self::VendorRisk => f.write_str("vendor risk"),
        }
    }
}

/// Payment readiness verdict for a deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentReadiness {
    #[serde(rename = "Ready")]
    Ready,
    #[serde(rename = "Ready with Clarifications")]
    ReadyWithClarifications,
    #[serde(rename = "Not Ready")]
    NotReady,
}

impl PaymentReadiness {
    fn from_label(label: &str) -> Option<Self> {
        match parse::normalize_label(label).as_str() {
            "ready" => Some(Self::Ready),
            "ready with clarifications" => Some(Self::ReadyWithClarifications),
            "not ready" => Some(Self::NotReady),
            _ => None,
        }
    }

    /// Scans free text for a verdict, most severe first.
    fn scan(text: &str) -> Option<Self> {
        let text = parse::normalize_label(text);
        if text.contains("not ready") {
            Some(Self::NotReady)
        } else if text.contains("ready with clarifications") {
            Some(Self::ReadyWithClarifications)
        } else if text.contains("ready") {
            Some(Self::Ready)
        } else {
            None
        }
    }
}

impl fmt::Display for PaymentReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::ReadyWithClarifications => f.write_str("Ready with Clarifications"),
            Self::NotReady => f.write_str("Not Ready"),
        }
    }
}

/// Vendor risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn from_label(label: &str) -> Option<Self> {
        match parse::normalize_label(label).as_str() {
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    fn scan(text: &str) -> Option<Self> {
        let text = parse::normalize_label(text);
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        [Self::High, Self::Medium, Self::Low]
            .into_iter()
            .find(|level| words.contains(&level.to_string().to_lowercase().as_str()))
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("Low"),
            Self::Medium => f.write_str("Medium"),
            Self::High => f.write_str("High"),
        }
    }
}

/// The verdict part of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AdvisoryFinding {
    /// Deliverable payment readiness.
    PaymentReadiness(PaymentReadiness),
    /// Vendor risk level.
    VendorRisk(RiskLevel),
}

impl AdvisoryFinding {
    /// Returns which kind of assessment produced this finding.
    #[must_use]
    pub fn kind(&self) -> AdvisoryKind {
        match self {
            Self::PaymentReadiness(_) => AdvisoryKind::PaymentReadiness,
            Self::VendorRisk(_) => AdvisoryKind::VendorRisk,
        }
    }
}

/// An advisory assessment attached to a workflow entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryAssessment {
    /// The verdict.
    pub finding: AdvisoryFinding,
    /// Supporting observations, in the order the advisor reported them.
    pub observations: Vec<String>,
    /// Model that produced the assessment, if any.
    pub model: Option<String>,
    /// When the assessment was made.
    pub assessed_at: DateTime<Utc>,
}

impl AdvisoryAssessment {
    /// Creates an assessment made now.
    #[must_use]
    pub fn new(finding: AdvisoryFinding, observations: Vec<String>) -> Self {
        Self {
            finding,
            observations,
            model: None,
            assessed_at: Utc::now(),
        }
    }

    /// Shorthand for a payment readiness assessment.
    #[must_use]
    pub fn payment_readiness(readiness: PaymentReadiness, observations: Vec<String>) -> Self {
        Self::new(AdvisoryFinding::PaymentReadiness(readiness), observations)
    }

    /// Shorthand for a vendor risk assessment.
    #[must_use]
    pub fn vendor_risk(level: RiskLevel, observations: Vec<String>) -> Self {
        Self::new(AdvisoryFinding::VendorRisk(level), observations)
    }

    /// Returns the assessment kind.
    #[must_use]
    pub fn kind(&self) -> AdvisoryKind {
        self.finding.kind()
    }

    /// Returns the payment readiness verdict, if this is a readiness assessment.
    #[must_use]
    pub fn readiness(&self) -> Option<PaymentReadiness> {
        match self.finding {
            AdvisoryFinding::PaymentReadiness(readiness) => Some(readiness),
            AdvisoryFinding::VendorRisk(_) => None,
        }
    }

    /// Returns the risk level, if this is a vendor risk assessment.
    #[must_use]
    pub fn risk_level(&self) -> Option<RiskLevel> {
        match self.finding {
            AdvisoryFinding::VendorRisk(level) => Some(level),
            AdvisoryFinding::PaymentReadiness(_) => None,
        }
    }

    /// One-line summary for audit notes.
    ///
    /// A `Not Ready` verdict is flagged so the HoP sees it when deciding.
    #[must_use]
    pub fn summary(&self) -> String {
        let verdict = match self.finding {
            AdvisoryFinding::PaymentReadiness(PaymentReadiness::NotReady) => {
                "AI payment readiness: Not Ready (advisory, review before approving)".to_string()
            }
            AdvisoryFinding::PaymentReadiness(readiness) => {
                format!("AI payment readiness: {readiness}")
            }
            AdvisoryFinding::VendorRisk(level) => format!("AI vendor risk: {level}"),
        };
        if self.observations.is_empty() {
            verdict
        } else {
            format!("{verdict}; {}", self.observations.join("; "))
        }
    }
}

/// The AI Advisory collaborator.
#[async_trait]
pub trait AiAdvisory: Send + Sync {
    /// Assesses an entity snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if no verdict could be obtained.
    async fn assess(
        &self,
        kind: AdvisoryKind,
        snapshot: &JsonValue,
    ) -> Result<AdvisoryAssessment, Report<AdvisoryError>>;
}

/// Advisor that asks an LLM and parses the answer leniently.
pub struct LlmAdvisor<B: LlmBackend> {
    backend: B,
}

impl<B: LlmBackend> LlmAdvisor<B> {
    /// Creates an advisor over a backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn request(kind: AdvisoryKind, snapshot: &JsonValue) -> LlmRequest {
        let (system, answer_shape) = match kind {
            AdvisoryKind::PaymentReadiness => (
                "You review deliverables submitted for payment in a procurement system.",
                r#"{"payment_readiness": "Ready" | "Ready with Clarifications" | "Not Ready", "observations": [string]}"#,
            ),
            AdvisoryKind::VendorRisk => (
                "You assess vendor due-diligence questionnaires for a procurement team.",
                r#"{"risk_level": "Low" | "Medium" | "High", "observations": [string]}"#,
            ),
        };
        let snapshot = serde_json::to_string_pretty(snapshot).unwrap_or_default();
        LlmRequest::new(format!(
            "Record:\n{snapshot}\n\nAnswer with a single JSON object of the form {answer_shape}."
        ))
        .with_system(system)
        .with_json_output()
        .with_temperature(0.0)
        .with_max_tokens(ANSWER_TOKEN_LIMIT)
    }

    /// Recovers a finding from a model answer.
    ///
    /// Structured output wins; then a JSON object found in the text; then a
    /// keyword scan of the raw text. Observations are only available from JSON.
    fn interpret(
        kind: AdvisoryKind,
        structured: Option<&JsonValue>,
        content: &str,
    ) -> Option<(AdvisoryFinding, Vec<String>)> {
        let json = structured
            .cloned()
            .or_else(|| parse::extract_json_object(content));

        if let Some(json) = json {
            let finding = match kind {
                AdvisoryKind::PaymentReadiness => {
                    parse::string_field(&json, &["payment_readiness", "readiness", "status"])
                        .and_then(PaymentReadiness::from_label)
                        .map(AdvisoryFinding::PaymentReadiness)
                }
                AdvisoryKind::VendorRisk => {
                    parse::string_field(&json, &["risk_level", "risk", "level"])
                        .and_then(RiskLevel::from_label)
                        .map(AdvisoryFinding::VendorRisk)
                }
            };
            if let Some(finding) = finding {
                return Some((finding, parse::observations(&json)));
            }
        }

        let finding = match kind {
            AdvisoryKind::PaymentReadiness => {
                PaymentReadiness::scan(content).map(AdvisoryFinding::PaymentReadiness)
            }
            AdvisoryKind::VendorRisk => RiskLevel::scan(content).map(AdvisoryFinding::VendorRisk),
        }?;
        Some((finding, Vec::new()))
    }
}

#[async_trait]
impl<B: LlmBackend> AiAdvisory for LlmAdvisor<B> {
    #[instrument(skip(self, snapshot), fields(model = %self.backend.model()))]
    async fn assess(
        &self,
        kind: AdvisoryKind,
        snapshot: &JsonValue,
    ) -> Result<AdvisoryAssessment, Report<AdvisoryError>> {
        let request = Self::request(kind, snapshot);
        let response = self
            .backend
            .generate(&request)
            .await
            .map_err(|source| AdvisoryError::Backend { kind, source })?;

        let (finding, observations) =
            Self::interpret(kind, response.structured_output.as_ref(), &response.content)
                .ok_or_else(|| AdvisoryError::UnparseableResponse {
                    kind,
                    excerpt: response.content.chars().take(120).collect(),
                })?;

        debug!(?finding, observations = observations.len(), "advisory assessment");

        let mut assessment = AdvisoryAssessment::new(finding, observations);
        assessment.model = Some(response.model);
        Ok(assessment)
    }
}
