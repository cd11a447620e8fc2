use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResumeId;

/// Proof that a trust score was anchored to the register. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub content_hash: String,
    pub anchor_id: String,
    pub timestamp: DateTime<Utc>,
    pub backend_id: String,
}

/// Metadata submitted to the register alongside the content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorMetadata {
    pub resume_id: ResumeId,
    pub overall_score: f64,
    pub model_version: String,
}

/// What the register returns for a hash lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub record_id: String,
    pub content_hash: String,
    pub metadata: AnchorMetadata,
    pub recorded_at: DateTime<Utc>,
}
