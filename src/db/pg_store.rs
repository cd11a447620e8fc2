use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ClaimAssessment, Explanation, LedgerRecord, TrustScore};

use super::VerificationStore;

/// Postgres-backed store. Every write is an INSERT; nothing is updated.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationStore for PgStore {
    async fn save_assessment(&self, resume_id: &str, assessment: &ClaimAssessment) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO claim_assessments (run_id, resume_id, claim_id, label, model_version, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(assessment.run_id)
        .bind(resume_id)
        .bind(&assessment.claim_id)
        .bind(assessment.prediction.label.as_str())
        .bind(&assessment.prediction.model_version)
        .bind(Json(assessment))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_trust_score(&self, run_id: Uuid, score: &TrustScore) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trust_scores (run_id, resume_id, overall_score, model_version, generated_at, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(run_id)
        .bind(&score.resume_id)
        .bind(score.overall_score)
        .bind(&score.model_version)
        .bind(score.generated_at)
        .bind(Json(score))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_ledger_record(&self, resume_id: &str, record: &LedgerRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_records (resume_id, content_hash, anchor_id, backend_id, anchored_at, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(resume_id)
        .bind(&record.content_hash)
        .bind(&record.anchor_id)
        .bind(&record.backend_id)
        .bind(record.timestamp)
        .bind(Json(record))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_explanation(&self, claim_id: &str) -> anyhow::Result<Option<Explanation>> {
        let row = sqlx::query_scalar::<_, Json<Explanation>>(
            "SELECT payload->'explanation' FROM claim_assessments WHERE claim_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(claim_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(explanation)| explanation))
    }

    async fn latest_trust_score(&self, resume_id: &str) -> anyhow::Result<Option<TrustScore>> {
        let row = sqlx::query_scalar::<_, Json<TrustScore>>(
            "SELECT payload FROM trust_scores WHERE resume_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(resume_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(score)| score))
    }

    async fn ledger_record(&self, resume_id: &str) -> anyhow::Result<Option<LedgerRecord>> {
        let row = sqlx::query_scalar::<_, Json<LedgerRecord>>(
            "SELECT payload FROM ledger_records WHERE resume_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(resume_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(record)| record))
    }
}
