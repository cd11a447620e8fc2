use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ClaimId, ClaimType, ResumeId};

/// A single verifiable assertion extracted upstream from a resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    pub text: String,
    /// Extraction confidence reported by the claim extractor.
    #[serde(default = "default_stated_confidence")]
    pub stated_confidence: f64,
    pub resume_id: ResumeId,
    #[serde(default)]
    pub dates: Option<DateRange>,
    #[serde(default)]
    pub context: ClaimContext,
}

fn default_stated_confidence() -> f64 {
    1.0
}

/// Structured dates attached to experience/education claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    /// `None` means the position or enrolment is ongoing.
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default = "default_full_time")]
    pub full_time: bool,
}

fn default_full_time() -> bool {
    true
}

impl DateRange {
    pub fn is_inverted(&self) -> bool {
        matches!(self.end, Some(end) if end < self.start)
    }

    /// Open-ended ranges extend indefinitely; touching endpoints do not overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        let self_before_other = matches!(self.end, Some(end) if end <= other.start);
        let other_before_self = matches!(other.end, Some(end) if end <= self.start);
        !self_before_other && !other_before_self
    }
}

/// Handles the extraction stage attaches so sources can look the claim up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimContext {
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub credential_id: Option<String>,
    #[serde(default)]
    pub assessment_responses: Vec<String>,
}
