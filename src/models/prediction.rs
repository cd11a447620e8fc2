use serde::{Deserialize, Serialize};

use super::{ClaimId, Label};

/// Normalized class-probability output of the trust model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub verified: f64,
    pub doubtful: f64,
    pub fake: f64,
}

impl ClassProbabilities {
    /// Build from raw non-negative weights; degenerate input becomes uniform.
    pub fn normalized(raw: [f64; 3]) -> Self {
        let clean = raw.map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 });
        let total: f64 = clean.iter().sum();
        if total <= 0.0 {
            let third = 1.0 / 3.0;
            return Self::from_array([third; 3]);
        }
        Self::from_array(clean.map(|v| v / total))
    }

    pub fn from_array(p: [f64; 3]) -> Self {
        Self {
            verified: p[0],
            doubtful: p[1],
            fake: p[2],
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.verified, self.doubtful, self.fake]
    }

    pub fn get(&self, label: Label) -> f64 {
        self.as_array()[label.index()]
    }

    /// Winning label; exact ties go to the earlier label in `Label::ALL`.
    pub fn argmax(&self) -> Label {
        let mut best = Label::Verified;
        for label in Label::ALL {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }
}

/// One classification of one claim. Re-runs create new predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub claim_id: ClaimId,
    pub label: Label,
    pub probabilities: ClassProbabilities,
    /// Probability of `label`; always at least 1/3.
    pub confidence: f64,
    pub model_version: String,
    /// Digest of the feature vector snapshot this prediction was made from.
    pub feature_digest: String,
}
