pub mod classifier;
pub mod explainer;
pub mod features;
pub mod model;
pub mod scorer;

pub use classifier::Classifier;
pub use explainer::Explainer;
pub use features::{FeatureBuilder, FeatureVector, FEATURE_COUNT, FEATURE_NAMES, SENTINEL};
pub use model::{ModelArtifact, ModelError, TrustModel};
pub use scorer::{aggregate, aggregate_at, AggregationError};
