use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClaimId, Label, ResumeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub verified: u32,
    pub doubtful: u32,
    pub fake: u32,
}

impl LabelCounts {
    pub fn record(&mut self, label: Label) {
        match label {
            Label::Verified => self.verified += 1,
            Label::Doubtful => self.doubtful += 1,
            Label::Fake => self.fake += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.verified + self.doubtful + self.fake
    }
}

/// Resume-level authenticity estimate. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub resume_id: ResumeId,
    pub overall_score: f64,
    pub label_counts: LabelCounts,
    pub generated_at: DateTime<Utc>,
    /// Sorted ids of the claims whose predictions were aggregated.
    pub claim_ids: Vec<ClaimId>,
    pub model_version: String,
}
