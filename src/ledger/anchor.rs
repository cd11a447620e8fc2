use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use thiserror::Error;

use crate::models::{AnchorMetadata, LedgerRecord, RegisterEntry, TrustScore};

use super::backend::{LedgerBackend, LedgerBackendError};
use super::content_hash;

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("anchoring failed after {attempts} attempt(s): {reason}")]
    AnchorFailed { attempts: u32, reason: String },

    #[error("register lookup failed: {0}")]
    Lookup(#[from] LedgerBackendError),
}

#[derive(Debug, Clone)]
pub struct AnchorConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Writes content hashes of finalized trust scores to a register.
#[derive(Clone)]
pub struct LedgerAnchor {
    backend: Arc<dyn LedgerBackend>,
    config: AnchorConfig,
}

impl LedgerAnchor {
    pub fn new(backend: Arc<dyn LedgerBackend>, config: AnchorConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend_id(&self) -> &str {
        self.backend.backend_id()
    }

    /// Anchor `score`, reusing an existing register entry for the same hash.
    pub async fn anchor(&self, score: &TrustScore) -> Result<LedgerRecord, AnchorError> {
        let hash = content_hash(score);
        let metadata = AnchorMetadata {
            resume_id: score.resume_id.clone(),
            overall_score: score.overall_score,
            model_version: score.model_version.clone(),
        };
        let max_attempts = self.config.max_attempts.max(1);

        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            match self.try_anchor(&hash, &metadata).await {
                Ok(record) => {
                    tracing::info!(
                        resume_id = %score.resume_id,
                        content_hash = %record.content_hash,
                        anchor_id = %record.anchor_id,
                        attempt,
                        "Trust score anchored"
                    );
                    return Ok(record);
                }
                Err(e) => {
                    tracing::warn!(
                        resume_id = %score.resume_id,
                        attempt,
                        error = %e,
                        "Anchor attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
            if attempt < max_attempts {
                let exp = (attempt - 1).min(16);
                tokio::time::sleep(self.config.backoff.saturating_mul(1u32 << exp)).await;
            }
        }

        counter!("anchors_failed_total").increment(1);
        Err(AnchorError::AnchorFailed {
            attempts: max_attempts,
            reason: last_error,
        })
    }

    async fn try_anchor(
        &self,
        hash: &str,
        metadata: &AnchorMetadata,
    ) -> Result<LedgerRecord, LedgerBackendError> {
        if let Some(existing) = self.backend.lookup(hash).await? {
            tracing::debug!(content_hash = %hash, "Hash already anchored");
            return Ok(LedgerRecord {
                content_hash: existing.content_hash,
                anchor_id: existing.record_id,
                timestamp: existing.recorded_at,
                backend_id: self.backend.backend_id().to_string(),
            });
        }

        let anchor_id = self.backend.submit(hash, metadata).await?;
        Ok(LedgerRecord {
            content_hash: hash.to_string(),
            anchor_id,
            timestamp: Utc::now(),
            backend_id: self.backend.backend_id().to_string(),
        })
    }

    /// Register entry behind a record, if the register still has it.
    pub async fn lookup(&self, record: &LedgerRecord) -> Result<Option<RegisterEntry>, AnchorError> {
        Ok(self.backend.lookup(&record.content_hash).await?)
    }
}
