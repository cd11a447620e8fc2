//! Deterministic feature extraction for one claim.
//!
//! The layout is fixed: five source blocks of (score, confidence, available)
//! in slot order, then claim-intrinsic features, then a one-hot claim type.
//! Model artifacts declare this exact order in `feature_names`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{Claim, ClaimId, ClaimType, SourceResult, SourceStatus};
use crate::sources::SourceKind;

/// Value of every missing or not-applicable feature.
pub const SENTINEL: f64 = -1.0;

pub const FEATURE_COUNT: usize = 25;

const PER_SOURCE: usize = 3;
const SOURCE_BLOCK: usize = PER_SOURCE * 5;

pub const CLAIM_SPECIFICITY: usize = SOURCE_BLOCK;
pub const STATED_CONFIDENCE: usize = SOURCE_BLOCK + 1;
pub const DUPLICATE_CLAIM_COUNT: usize = SOURCE_BLOCK + 2;
pub const TIMELINE_VIOLATION: usize = SOURCE_BLOCK + 3;
pub const EVIDENCE_COVERAGE: usize = SOURCE_BLOCK + 4;
const TYPE_BASE: usize = SOURCE_BLOCK + 5;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "code_hosting_score",
    "code_hosting_confidence",
    "code_hosting_available",
    "professional_network_score",
    "professional_network_confidence",
    "professional_network_available",
    "certificate_score",
    "certificate_confidence",
    "certificate_available",
    "timeline_score",
    "timeline_confidence",
    "timeline_available",
    "skill_assessment_score",
    "skill_assessment_confidence",
    "skill_assessment_available",
    "claim_specificity",
    "stated_confidence",
    "duplicate_claim_count",
    "timeline_violation",
    "evidence_coverage",
    "type_skill",
    "type_education",
    "type_experience",
    "type_certification",
    "type_project",
];

pub fn score_index(kind: SourceKind) -> usize {
    kind.slot() * PER_SOURCE
}

pub fn confidence_index(kind: SourceKind) -> usize {
    kind.slot() * PER_SOURCE + 1
}

pub fn available_index(kind: SourceKind) -> usize {
    kind.slot() * PER_SOURCE + 2
}

pub fn type_index(claim_type: ClaimType) -> usize {
    let offset = match claim_type {
        ClaimType::Skill => 0,
        ClaimType::Education => 1,
        ClaimType::Experience => 2,
        ClaimType::Certification => 3,
        ClaimType::Project => 4,
    };
    TYPE_BASE + offset
}

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

/// Human-readable description of a feature at its observed value.
pub fn describe(index: usize, value: f64) -> String {
    if index < SOURCE_BLOCK {
        let kind = SourceKind::ALL[index / PER_SOURCE];
        let name = kind.display_name();
        if value == SENTINEL {
            return format!("{name}: not checked");
        }
        return match index % PER_SOURCE {
            0 => format!("{name} score {value:.2}"),
            1 => format!("{name} confidence {value:.2}"),
            _ if value >= 1.0 => format!("{name} answered"),
            _ => format!("{name} attempted but unavailable"),
        };
    }

    match index {
        CLAIM_SPECIFICITY => format!("Claim specificity {value:.2}"),
        STATED_CONFIDENCE => format!("Extractor confidence {value:.2}"),
        DUPLICATE_CLAIM_COUNT => format!("{value:.0} duplicate claim(s) in resume"),
        TIMELINE_VIOLATION if value == SENTINEL => "Timeline: not applicable".to_string(),
        TIMELINE_VIOLATION if value >= 1.0 => "Dates conflict with another claim".to_string(),
        TIMELINE_VIOLATION => "Dates consistent with other claims".to_string(),
        EVIDENCE_COVERAGE if value == SENTINEL => "No source attempted".to_string(),
        EVIDENCE_COVERAGE => format!("{:.0}% of sources answered", value * 100.0),
        i if (TYPE_BASE..FEATURE_COUNT).contains(&i) => {
            let claim_type = ClaimType::ALL[i - TYPE_BASE];
            if value >= 1.0 {
                format!("Claim type is {claim_type}")
            } else {
                format!("Claim type is not {claim_type}")
            }
        }
        _ => FEATURE_NAMES.get(index).map_or_else(String::new, |n| n.to_string()),
    }
}

/// Snapshot of the features a prediction was made from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub claim_id: ClaimId,
    pub values: [f64; FEATURE_COUNT],
    /// Excluded from `values` and from the digest.
    pub evaluated_at: DateTime<Utc>,
}

impl FeatureVector {
    /// Lowercase hex SHA-256 over the claim id and the exact value bits.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.claim_id.as_bytes());
        for v in &self.values {
            hasher.update(v.to_bits().to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }
}

/// Builds feature vectors for the claims of one resume.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    claims: Vec<Claim>,
}

impl FeatureBuilder {
    pub fn new(claims: &[Claim]) -> Self {
        Self {
            claims: claims.to_vec(),
        }
    }

    pub fn build(&self, claim: &Claim, results: &[SourceResult]) -> FeatureVector {
        let mut values = [SENTINEL; FEATURE_COUNT];

        for result in results.iter().filter(|r| r.claim_id == claim.id) {
            let kind = result.source;
            match result.status {
                SourceStatus::Ok => {
                    values[score_index(kind)] = finite_or_sentinel(result.score);
                    values[confidence_index(kind)] = finite_or_sentinel(result.confidence);
                    values[available_index(kind)] = 1.0;
                }
                SourceStatus::Timeout | SourceStatus::Error => {
                    values[available_index(kind)] = 0.0;
                }
            }
        }

        values[CLAIM_SPECIFICITY] = specificity(&claim.text);
        values[STATED_CONFIDENCE] = if claim.stated_confidence.is_finite() {
            claim.stated_confidence.clamp(0.0, 1.0)
        } else {
            SENTINEL
        };
        values[DUPLICATE_CLAIM_COUNT] = self.duplicate_count(claim) as f64;
        values[TIMELINE_VIOLATION] = self.timeline_violation(claim);
        values[EVIDENCE_COVERAGE] = coverage(claim, results);
        for claim_type in ClaimType::ALL {
            values[type_index(claim_type)] = if claim.claim_type == claim_type { 1.0 } else { 0.0 };
        }

        FeatureVector {
            claim_id: claim.id.clone(),
            values,
            evaluated_at: Utc::now(),
        }
    }

    fn duplicate_count(&self, claim: &Claim) -> usize {
        let text = normalize(&claim.text);
        self.claims
            .iter()
            .filter(|other| {
                other.id != claim.id
                    && other.claim_type == claim.claim_type
                    && normalize(&other.text) == text
            })
            .count()
    }

    fn timeline_violation(&self, claim: &Claim) -> f64 {
        if !claim.claim_type.is_dated() {
            return SENTINEL;
        }
        let Some(range) = claim.dates else {
            return SENTINEL;
        };
        if range.is_inverted() {
            return 1.0;
        }
        if !range.full_time {
            return 0.0;
        }

        let conflict = self.claims.iter().any(|other| {
            other.id != claim.id
                && other.claim_type.is_dated()
                && matches!(other.dates, Some(o) if o.full_time && !o.is_inverted() && range.overlaps(&o))
        });
        if conflict {
            1.0
        } else {
            0.0
        }
    }
}

fn finite_or_sentinel(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        SENTINEL
    }
}

pub fn specificity(text: &str) -> f64 {
    let length = (text.chars().count() as f64 / 100.0).min(0.5);
    let digits = if text.chars().any(|c| c.is_ascii_digit()) { 0.25 } else { 0.0 };
    let proper = if text
        .split_whitespace()
        .any(|w| w.chars().next().is_some_and(char::is_uppercase))
    {
        0.25
    } else {
        0.0
    };
    length + digits + proper
}

fn coverage(claim: &Claim, results: &[SourceResult]) -> f64 {
    let attempted: Vec<_> = results.iter().filter(|r| r.claim_id == claim.id).collect();
    if attempted.is_empty() {
        return SENTINEL;
    }
    let ok = attempted.iter().filter(|r| r.is_ok()).count();
    ok as f64 / attempted.len() as f64
}

/// Lowercase with whitespace runs collapsed.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
