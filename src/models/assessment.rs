use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intelligence::features::FeatureVector;

use super::{ClaimId, ClaimType, Explanation, LedgerRecord, Prediction, SourceResult, TrustScore};

/// How much external evidence backed a claim, independent of its label.
///
/// Keeps "infrastructure could not verify" apart from "the claim looks fake".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    /// At least one source returned a signal.
    Corroborated,
    /// Sources were attempted but none answered.
    InfrastructureUnavailable,
    /// No source applies to this claim type.
    Unverifiable,
}

impl EvidenceStatus {
    pub fn from_results(results: &[SourceResult]) -> Self {
        if results.is_empty() {
            EvidenceStatus::Unverifiable
        } else if results.iter().any(SourceResult::is_ok) {
            EvidenceStatus::Corroborated
        } else {
            EvidenceStatus::InfrastructureUnavailable
        }
    }
}

/// Everything produced for one claim in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimAssessment {
    pub run_id: Uuid,
    pub claim_id: ClaimId,
    pub claim_type: ClaimType,
    pub evidence_status: EvidenceStatus,
    pub source_results: Vec<SourceResult>,
    pub features: FeatureVector,
    pub prediction: Prediction,
    pub explanation: Explanation,
}

/// Claims that had not finished when the resume deadline expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialVerification {
    pub completed: Vec<ClaimId>,
    pub pending: Vec<ClaimId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorOutcome {
    Anchored { record: LedgerRecord },
    Failed { reason: String },
}

/// Result of `run_verification` for one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub run_id: Uuid,
    pub trust_score: TrustScore,
    pub assessments: Vec<ClaimAssessment>,
    pub partial: Option<PartialVerification>,
    pub anchor: AnchorOutcome,
}

impl VerificationReport {
    pub fn assessment(&self, claim_id: &str) -> Option<&ClaimAssessment> {
        self.assessments.iter().find(|a| a.claim_id == claim_id)
    }
}
