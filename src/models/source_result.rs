use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::sources::SourceKind;

use super::ClaimId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Timeout,
    Error,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Timeout => "timeout",
            SourceStatus::Error => "error",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one (claim, source) verification. Only the final attempt is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: SourceKind,
    pub claim_id: ClaimId,
    pub score: f64,
    pub confidence: f64,
    pub evidence: Value,
    pub status: SourceStatus,
    pub latency_ms: u64,
    pub attempts: u32,
}

impl SourceResult {
    /// Successful signal. Score and confidence are clamped to [0, 1]; NaN becomes 0.
    pub fn ok(
        source: SourceKind,
        claim_id: &str,
        score: f64,
        confidence: f64,
        evidence: Value,
    ) -> Self {
        Self {
            source,
            claim_id: claim_id.to_string(),
            score: unit_interval(score),
            confidence: unit_interval(confidence),
            evidence,
            status: SourceStatus::Ok,
            latency_ms: 0,
            attempts: 1,
        }
    }

    pub fn error(source: SourceKind, claim_id: &str, reason: impl Into<String>) -> Self {
        Self {
            source,
            claim_id: claim_id.to_string(),
            score: 0.0,
            confidence: 0.0,
            evidence: serde_json::json!({ "error": reason.into() }),
            status: SourceStatus::Error,
            latency_ms: 0,
            attempts: 1,
        }
    }

    pub fn timeout(source: SourceKind, claim_id: &str) -> Self {
        Self {
            source,
            claim_id: claim_id.to_string(),
            score: 0.0,
            confidence: 0.0,
            evidence: Value::Null,
            status: SourceStatus::Timeout,
            latency_ms: 0,
            attempts: 1,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = latency.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == SourceStatus::Ok
    }
}

fn unit_interval(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
