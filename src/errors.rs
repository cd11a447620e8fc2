use crate::intelligence::AggregationError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid claim: {0}")]
    InvalidClaim(String),

    #[error("No claim could be verified for resume {0}")]
    EmptyVerificationSet(String),

    #[error("Predictions mix model versions: {0:?}")]
    MixedModelVersions(Vec<String>),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    /// Short machine-readable kind, used for job failure reasons and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidClaim(_) => "invalid_claim",
            PipelineError::EmptyVerificationSet(_) => "empty_verification_set",
            PipelineError::MixedModelVersions(_) => "mixed_model_versions",
            PipelineError::Store(_) => "store",
        }
    }

    pub(crate) fn from_aggregation(resume_id: &str, e: AggregationError) -> Self {
        match e {
            AggregationError::EmptyVerificationSet => {
                PipelineError::EmptyVerificationSet(resume_id.to_string())
            }
            AggregationError::MixedModelVersions(versions) => {
                PipelineError::MixedModelVersions(versions)
            }
        }
    }
}
