use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{LabelCounts, Prediction, TrustScore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no claim predictions to aggregate")]
    EmptyVerificationSet,

    #[error("predictions come from different model versions: {0:?}")]
    MixedModelVersions(Vec<String>),
}

/// Aggregate per-claim predictions into one resume-level trust score.
pub fn aggregate(resume_id: &str, predictions: &[Prediction]) -> Result<TrustScore, AggregationError> {
    aggregate_at(resume_id, predictions, Utc::now())
}

/// Confidence-weighted mean of the class values (verified=100, doubtful=50,
/// fake=0), clamped to [0, 100].
pub fn aggregate_at(
    resume_id: &str,
    predictions: &[Prediction],
    generated_at: DateTime<Utc>,
) -> Result<TrustScore, AggregationError> {
    let first = predictions.first().ok_or(AggregationError::EmptyVerificationSet)?;

    let mut versions: Vec<String> = predictions.iter().map(|p| p.model_version.clone()).collect();
    versions.sort();
    versions.dedup();
    if versions.len() > 1 {
        return Err(AggregationError::MixedModelVersions(versions));
    }

    let mut label_counts = LabelCounts::default();
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for p in predictions {
        label_counts.record(p.label);
        let confidence = if p.confidence.is_finite() { p.confidence.max(0.0) } else { 0.0 };
        weighted += p.label.class_value() * confidence;
        weight += confidence;
    }

    let overall_score = if weight > 0.0 {
        (weighted / weight).clamp(0.0, 100.0)
    } else {
        // Every confidence was zero: fall back to the unweighted mean.
        let total: f64 = predictions.iter().map(|p| p.label.class_value()).sum();
        (total / predictions.len() as f64).clamp(0.0, 100.0)
    };

    let mut claim_ids: Vec<String> = predictions.iter().map(|p| p.claim_id.clone()).collect();
    claim_ids.sort();

    Ok(TrustScore {
        resume_id: resume_id.to_string(),
        overall_score,
        label_counts,
        generated_at,
        claim_ids,
        model_version: first.model_version.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassProbabilities, Label};

    fn prediction(id: &str, label: Label, confidence: f64) -> Prediction {
        Prediction {
            claim_id: id.into(),
            label,
            probabilities: ClassProbabilities::from_array([1.0 / 3.0; 3]),
            confidence,
            model_version: "v1".into(),
            feature_digest: String::new(),
        }
    }

    #[test]
    fn test_empty_set_is_rejected() {
        assert_eq!(aggregate("R1", &[]), Err(AggregationError::EmptyVerificationSet));
    }

    #[test]
    fn test_confidence_weighting() {
        let predictions = vec![
            prediction("C2", Label::Verified, 0.9),
            prediction("C1", Label::Fake, 0.3),
        ];
        let score = aggregate("R1", &predictions).unwrap();
        // (100 * 0.9 + 0 * 0.3) / 1.2 = 75
        assert!((score.overall_score - 75.0).abs() < 1e-9);
        assert_eq!(score.claim_ids, vec!["C1", "C2"]);
        assert_eq!(score.label_counts.verified, 1);
        assert_eq!(score.label_counts.fake, 1);
    }

    #[test]
    fn test_all_verified_scores_100() {
        let predictions = vec![
            prediction("C1", Label::Verified, 0.5),
            prediction("C2", Label::Verified, 0.99),
        ];
        let score = aggregate("R1", &predictions).unwrap().overall_score;
        assert!((score - 100.0).abs() < 1e-9 && score <= 100.0);
    }

    #[test]
    fn test_mixed_versions_rejected() {
        let mut other = prediction("C2", Label::Doubtful, 0.6);
        other.model_version = "v2".into();
        let err = aggregate("R1", &[prediction("C1", Label::Verified, 0.8), other]).unwrap_err();
        assert_eq!(
            err,
            AggregationError::MixedModelVersions(vec!["v1".into(), "v2".into()])
        );
    }
}
