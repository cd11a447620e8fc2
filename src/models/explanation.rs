use serde::{Deserialize, Serialize};

use super::{ClaimId, Label};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub description: String,
    pub value: f64,
    /// Signed change of the winning-class probability credited to this feature.
    pub contribution: f64,
}

/// Additive attribution of one prediction:
/// `Σ contributions + remainder == prediction_score - baseline_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub claim_id: ClaimId,
    pub label: Label,
    pub model_version: String,
    pub feature_digest: String,
    pub prediction_score: f64,
    pub baseline_score: f64,
    /// Ranked by absolute contribution, largest first.
    pub contributions: Vec<FeatureContribution>,
    /// Sum of the contributions cut off by top-k.
    pub remainder: f64,
}

impl Explanation {
    pub fn total_contribution(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum::<f64>() + self.remainder
    }

    pub fn contribution_of(&self, feature: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.contribution)
    }
}
