use std::sync::Arc;

use metrics::counter;

use crate::models::Prediction;

use super::features::FeatureVector;
use super::model::TrustModel;

/// Labels feature snapshots with a shared, read-only trust model.
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn TrustModel>,
}

impl Classifier {
    pub fn new(model: Arc<dyn TrustModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn TrustModel> {
        &self.model
    }

    pub fn model_version(&self) -> &str {
        self.model.version()
    }

    /// Deterministic for a given snapshot. Ties go to the earlier label in
    /// verified, doubtful, fake order.
    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let probabilities = self.model.class_probabilities(&features.values);
        let label = probabilities.argmax();
        let confidence = probabilities.get(label);

        counter!("claims_classified_total", "label" => label.as_str()).increment(1);
        tracing::debug!(
            claim_id = %features.claim_id,
            label = %label,
            confidence,
            "Claim classified"
        );

        Prediction {
            claim_id: features.claim_id.clone(),
            label,
            probabilities,
            confidence,
            model_version: self.model.version().to_string(),
            feature_digest: features.digest(),
        }
    }
}
