pub mod assessment;
pub mod claim;
pub mod explanation;
pub mod ledger;
pub mod prediction;
pub mod source_result;
pub mod trust_score;

pub use assessment::{
    AnchorOutcome, ClaimAssessment, EvidenceStatus, PartialVerification, VerificationReport,
};
pub use claim::{Claim, ClaimContext, DateRange};
pub use explanation::{Explanation, FeatureContribution};
pub use ledger::{AnchorMetadata, LedgerRecord, RegisterEntry};
pub use prediction::{ClassProbabilities, Prediction};
pub use source_result::{SourceResult, SourceStatus};
pub use trust_score::{LabelCounts, TrustScore};

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ClaimId = String;
pub type ResumeId = String;

// ---------------------------------------------------------------------------
// ClaimType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    Skill,
    Education,
    Experience,
    Certification,
    Project,
}

impl ClaimType {
    pub const ALL: [ClaimType; 5] = [
        ClaimType::Skill,
        ClaimType::Education,
        ClaimType::Experience,
        ClaimType::Certification,
        ClaimType::Project,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Skill => "skill",
            ClaimType::Education => "education",
            ClaimType::Experience => "experience",
            ClaimType::Certification => "certification",
            ClaimType::Project => "project",
        }
    }

    /// Claim types whose structured dates take part in timeline checks.
    pub fn is_dated(&self) -> bool {
        matches!(self, ClaimType::Education | ClaimType::Experience)
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Label
// ---------------------------------------------------------------------------

/// Per-claim classification produced by the trust model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Verified,
    Doubtful,
    Fake,
}

impl Label {
    /// Class order of the model output. Ties resolve to the earlier label.
    pub const ALL: [Label; 3] = [Label::Verified, Label::Doubtful, Label::Fake];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Verified => "verified",
            Label::Doubtful => "doubtful",
            Label::Fake => "fake",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Label::Verified => 0,
            Label::Doubtful => 1,
            Label::Fake => 2,
        }
    }

    /// Contribution of one claim with this label to the 0-100 trust score.
    pub fn class_value(&self) -> f64 {
        match self {
            Label::Verified => 100.0,
            Label::Doubtful => 50.0,
            Label::Fake => 0.0,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
