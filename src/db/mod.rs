//! Persistence of verification results behind [`VerificationStore`].

pub mod memory_store;
pub mod pg_store;

pub use memory_store::MemoryStore;
pub use pg_store::PgStore;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ClaimAssessment, Explanation, LedgerRecord, TrustScore};

/// Append-only store. Reads return the most recently written record.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn save_assessment(&self, resume_id: &str, assessment: &ClaimAssessment) -> anyhow::Result<()>;

    async fn save_trust_score(&self, run_id: Uuid, score: &TrustScore) -> anyhow::Result<()>;

    async fn save_ledger_record(&self, resume_id: &str, record: &LedgerRecord) -> anyhow::Result<()>;

    async fn latest_explanation(&self, claim_id: &str) -> anyhow::Result<Option<Explanation>>;

    async fn latest_trust_score(&self, resume_id: &str) -> anyhow::Result<Option<TrustScore>>;

    async fn ledger_record(&self, resume_id: &str) -> anyhow::Result<Option<LedgerRecord>>;
}

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
