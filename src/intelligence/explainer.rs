//! Additive feature attributions for one prediction.
//!
//! Interventional permutation Shapley values: for each background row and
//! each of a fixed set of feature orderings, features are switched from the
//! background row to the instance one at a time and the change in the winning
//! class probability is credited to the switched feature. Every pass
//! telescopes from f(background) to f(instance), so the attributions sum to
//! `prediction_score - baseline_score` up to float rounding.

use std::sync::Arc;

use crate::models::{Explanation, FeatureContribution, Label, Prediction};

use super::features::{describe, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use super::model::TrustModel;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_PERMUTATIONS: usize = 8;

#[derive(Clone)]
pub struct Explainer {
    model: Arc<dyn TrustModel>,
    top_k: usize,
    permutations: Vec<[usize; FEATURE_COUNT]>,
}

impl Explainer {
    pub fn new(model: Arc<dyn TrustModel>, top_k: usize) -> Self {
        Self::with_permutations(model, top_k, DEFAULT_PERMUTATIONS)
    }

    pub fn with_permutations(model: Arc<dyn TrustModel>, top_k: usize, count: usize) -> Self {
        Self {
            model,
            top_k,
            permutations: orderings(count.max(1)),
        }
    }

    pub fn explain(&self, features: &FeatureVector, prediction: &Prediction) -> Explanation {
        let label = prediction.label;
        let x = &features.values;
        let prediction_score = self.model.class_probabilities(x).get(label);

        let background = self.model.background();
        let (phi, baseline_score) = if background.is_empty() {
            // No reference rows: the whole score is unattributed.
            ([0.0; FEATURE_COUNT], prediction_score)
        } else {
            self.attribute(x, background, label)
        };

        let mut ranked: Vec<usize> = (0..FEATURE_COUNT).filter(|&i| phi[i] != 0.0).collect();
        ranked.sort_by(|&a, &b| phi[b].abs().total_cmp(&phi[a].abs()).then(a.cmp(&b)));

        let mut remainder = 0.0;
        let mut contributions = Vec::with_capacity(self.top_k.min(ranked.len()));
        for (rank, &i) in ranked.iter().enumerate() {
            if rank < self.top_k {
                contributions.push(FeatureContribution {
                    feature: FEATURE_NAMES[i].to_string(),
                    description: describe(i, x[i]),
                    value: x[i],
                    contribution: phi[i],
                });
            } else {
                remainder += phi[i];
            }
        }

        Explanation {
            claim_id: features.claim_id.clone(),
            label,
            model_version: self.model.version().to_string(),
            feature_digest: features.digest(),
            prediction_score,
            baseline_score,
            contributions,
            remainder,
        }
    }

    fn attribute(
        &self,
        x: &[f64; FEATURE_COUNT],
        background: &[Vec<f64>],
        label: Label,
    ) -> ([f64; FEATURE_COUNT], f64) {
        let mut phi = [0.0; FEATURE_COUNT];
        let mut baseline = 0.0;
        let mut z = [0.0; FEATURE_COUNT];

        for row in background {
            let start = self.model.class_probabilities(row).get(label);
            baseline += start;

            for order in &self.permutations {
                z.iter_mut().zip(row).for_each(|(z, b)| *z = *b);
                let mut previous = start;
                for &i in order {
                    if z[i] == x[i] {
                        continue;
                    }
                    z[i] = x[i];
                    let current = self.model.class_probabilities(&z).get(label);
                    phi[i] += current - previous;
                    previous = current;
                }
            }
        }

        let passes = (background.len() * self.permutations.len()) as f64;
        phi.iter_mut().for_each(|p| *p /= passes);
        (phi, baseline / background.len() as f64)
    }
}

/// Identity, reverse, then rotations of each spread across the features.
fn orderings(count: usize) -> Vec<[usize; FEATURE_COUNT]> {
    let mut identity = [0; FEATURE_COUNT];
    identity.iter_mut().enumerate().for_each(|(i, v)| *v = i);
    let mut reverse = identity;
    reverse.reverse();

    let rounds = count.div_ceil(2);
    let step = (FEATURE_COUNT / rounds).max(1);
    (0..count)
        .map(|k| {
            let mut order = if k % 2 == 0 { identity } else { reverse };
            order.rotate_left(((k / 2) * step) % FEATURE_COUNT);
            order
        })
        .collect()
}
