use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ClaimAssessment, Explanation, LedgerRecord, TrustScore};

use super::VerificationStore;

#[derive(Default)]
struct Tables {
    assessments: Vec<(String, ClaimAssessment)>,
    trust_scores: Vec<(Uuid, TrustScore)>,
    ledger_records: Vec<(String, LedgerRecord)>,
}

/// Process-local store for the CLI and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assessment_count(&self) -> usize {
        self.tables.read().await.assessments.len()
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn save_assessment(&self, resume_id: &str, assessment: &ClaimAssessment) -> anyhow::Result<()> {
        self.tables
            .write()
            .await
            .assessments
            .push((resume_id.to_string(), assessment.clone()));
        Ok(())
    }

    async fn save_trust_score(&self, run_id: Uuid, score: &TrustScore) -> anyhow::Result<()> {
        self.tables.write().await.trust_scores.push((run_id, score.clone()));
        Ok(())
    }

    async fn save_ledger_record(&self, resume_id: &str, record: &LedgerRecord) -> anyhow::Result<()> {
        self.tables
            .write()
            .await
            .ledger_records
            .push((resume_id.to_string(), record.clone()));
        Ok(())
    }

    async fn latest_explanation(&self, claim_id: &str) -> anyhow::Result<Option<Explanation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assessments
            .iter()
            .rev()
            .find(|(_, a)| a.claim_id == claim_id)
            .map(|(_, a)| a.explanation.clone()))
    }

    async fn latest_trust_score(&self, resume_id: &str) -> anyhow::Result<Option<TrustScore>> {
        let tables = self.tables.read().await;
        Ok(tables
            .trust_scores
            .iter()
            .rev()
            .find(|(_, s)| s.resume_id == resume_id)
            .map(|(_, s)| s.clone()))
    }

    async fn ledger_record(&self, resume_id: &str) -> anyhow::Result<Option<LedgerRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger_records
            .iter()
            .rev()
            .find(|(r, _)| r == resume_id)
            .map(|(_, record)| record.clone()))
    }
}
