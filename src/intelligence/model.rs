//! Pretrained trust model artifacts.
//!
//! An artifact is a JSON file carrying a version, the feature order it was
//! trained on, a small background sample for explanations and one of two model
//! bodies: a softmax tree ensemble or a multinomial logistic model.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ClassProbabilities;

use super::features::{FEATURE_COUNT, FEATURE_NAMES};

const CLASSES: usize = 3;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("feature order mismatch at position {position}: expected {expected}, artifact has {found}")]
    FeatureMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

/// Marginal-query interface shared by every model body.
pub trait TrustModel: Send + Sync {
    fn version(&self) -> &str;

    /// Class probabilities in label order for one feature row.
    fn class_probabilities(&self, x: &[f64]) -> ClassProbabilities;

    /// Reference rows the explainer switches features from.
    fn background(&self) -> &[Vec<f64>];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub feature_names: Vec<String>,
    pub background: Vec<Vec<f64>>,
    pub model: ModelBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelBody {
    TreeEnsemble(TreeEnsemble),
    Logistic(LogisticModel),
}

/// Softmax booster: per-class margin = base score + sum of that class's trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub base_scores: Vec<f64>,
    /// `classes[c]` holds the trees of class `c`.
    pub classes: Vec<Vec<Tree>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    /// Node 0 is the root; children always have larger indices.
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    /// One weight row per class, each `FEATURE_COUNT` long.
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl ModelArtifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let artifact = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            version = %artifact.version,
            background_rows = artifact.background.len(),
            "Model artifact loaded"
        );
        Ok(artifact)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let artifact: Self = serde_json::from_str(raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version.trim().is_empty() {
            return Err(ModelError::Invalid("empty version".into()));
        }
        if self.feature_names.len() != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "expected {FEATURE_COUNT} features, artifact declares {}",
                self.feature_names.len()
            )));
        }
        for (position, (expected, found)) in FEATURE_NAMES.iter().zip(&self.feature_names).enumerate() {
            if *expected != found.as_str() {
                return Err(ModelError::FeatureMismatch {
                    position,
                    expected: expected.to_string(),
                    found: found.clone(),
                });
            }
        }
        if self.background.is_empty() {
            return Err(ModelError::Invalid("background sample is empty".into()));
        }
        if let Some(row) = self.background.iter().find(|r| r.len() != FEATURE_COUNT) {
            return Err(ModelError::Invalid(format!(
                "background row has {} values",
                row.len()
            )));
        }

        match &self.model {
            ModelBody::TreeEnsemble(ensemble) => ensemble.validate(),
            ModelBody::Logistic(logistic) => logistic.validate(),
        }
    }
}

impl TrustModel for ModelArtifact {
    fn version(&self) -> &str {
        &self.version
    }

    fn class_probabilities(&self, x: &[f64]) -> ClassProbabilities {
        let margins = match &self.model {
            ModelBody::TreeEnsemble(ensemble) => ensemble.margins(x),
            ModelBody::Logistic(logistic) => logistic.margins(x),
        };
        softmax(margins)
    }

    fn background(&self) -> &[Vec<f64>] {
        &self.background
    }
}

impl TreeEnsemble {
    fn validate(&self) -> Result<(), ModelError> {
        if self.base_scores.len() != CLASSES || self.classes.len() != CLASSES {
            return Err(ModelError::Invalid(format!(
                "tree ensemble needs {CLASSES} classes"
            )));
        }
        for tree in self.classes.iter().flatten() {
            tree.validate()?;
        }
        Ok(())
    }

    fn margins(&self, x: &[f64]) -> [f64; CLASSES] {
        let mut margins = [0.0; CLASSES];
        for (c, margin) in margins.iter_mut().enumerate() {
            *margin = self.base_scores[c] + self.classes[c].iter().map(|t| t.eval(x)).sum::<f64>();
        }
        margins
    }
}

impl Tree {
    fn validate(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("tree without nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= FEATURE_COUNT || !threshold.is_finite() {
                    return Err(ModelError::Invalid(format!("bad split at node {i}")));
                }
                let in_range = |child: usize| child > i && child < self.nodes.len();
                if !in_range(*left) || !in_range(*right) {
                    return Err(ModelError::Invalid(format!("bad child index at node {i}")));
                }
            }
        }
        Ok(())
    }

    /// `x[feature] < threshold` goes left. Validation guarantees termination.
    pub fn eval(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes.get(i) {
                Some(Node::Leaf { leaf }) => return *leaf,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    i = if v < *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }
}

impl LogisticModel {
    fn validate(&self) -> Result<(), ModelError> {
        if self.weights.len() != CLASSES || self.bias.len() != CLASSES {
            return Err(ModelError::Invalid(format!(
                "logistic model needs {CLASSES} classes"
            )));
        }
        if self.weights.iter().any(|w| w.len() != FEATURE_COUNT) {
            return Err(ModelError::Invalid("weight row length mismatch".into()));
        }
        Ok(())
    }

    fn margins(&self, x: &[f64]) -> [f64; CLASSES] {
        let mut margins = [0.0; CLASSES];
        for (c, margin) in margins.iter_mut().enumerate() {
            *margin = self.bias[c]
                + self.weights[c]
                    .iter()
                    .zip(x)
                    .map(|(w, v)| w * v)
                    .sum::<f64>();
        }
        margins
    }
}

fn softmax(margins: [f64; CLASSES]) -> ClassProbabilities {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    ClassProbabilities::normalized(margins.map(|m| (m - max).exp()))
}
