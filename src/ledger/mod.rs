//! Anchoring finalized trust scores to an append-only external register.

pub mod anchor;
pub mod auth;
pub mod backend;

pub use anchor::{AnchorConfig, AnchorError, LedgerAnchor};
pub use auth::LedgerAuth;
pub use backend::{HttpLedger, InMemoryLedger, LedgerBackend, LedgerBackendError};

use chrono::SecondsFormat;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::TrustScore;

/// Fields are declared in lexicographic order so the serialized object is
/// canonical.
#[derive(Serialize)]
struct CanonicalScore<'a> {
    claim_ids: Vec<&'a str>,
    generated_at: String,
    model_version: &'a str,
    overall_score: f64,
    resume_id: &'a str,
}

/// Compact canonical JSON of a trust score.
pub fn canonical_json(score: &TrustScore) -> String {
    let mut claim_ids: Vec<&str> = score.claim_ids.iter().map(String::as_str).collect();
    claim_ids.sort_unstable();
    let canonical = CanonicalScore {
        claim_ids,
        generated_at: score.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        model_version: &score.model_version,
        overall_score: score.overall_score,
        resume_id: &score.resume_id,
    };
    // Serializing plain strings and a float cannot fail.
    serde_json::to_string(&canonical).unwrap_or_default()
}

/// Lowercase hex SHA-256 of [`canonical_json`].
pub fn content_hash(score: &TrustScore) -> String {
    hex::encode(Sha256::digest(canonical_json(score).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LabelCounts;
    use chrono::{TimeZone, Utc};

    fn score(claim_ids: &[&str]) -> TrustScore {
        TrustScore {
            resume_id: "R1".into(),
            overall_score: 75.0,
            label_counts: LabelCounts::default(),
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            claim_ids: claim_ids.iter().map(|c| c.to_string()).collect(),
            model_version: "claim-trust-v1".into(),
        }
    }

    #[test]
    fn test_canonical_json_layout() {
        assert_eq!(
            canonical_json(&score(&["C2", "C1"])),
            r#"{"claim_ids":["C1","C2"],"generated_at":"2024-03-01T12:00:00.000Z","model_version":"claim-trust-v1","overall_score":75.0,"resume_id":"R1"}"#
        );
    }

    #[test]
    fn test_hash_ignores_claim_order() {
        let a = content_hash(&score(&["C1", "C2", "C3"]));
        let b = content_hash(&score(&["C3", "C1", "C2"]));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_changes_with_score() {
        let mut other = score(&["C1"]);
        other.overall_score = 74.0;
        assert_ne!(content_hash(&score(&["C1"])), content_hash(&other));
    }
}
