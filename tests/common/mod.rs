//! Shared fixtures: scripted verification sources, claim builders and a
//! pipeline wired to in-memory storage.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use resume_trust::db::{MemoryStore, PgStore, VerificationStore};
use resume_trust::intelligence::{ModelArtifact, TrustModel};
use resume_trust::ledger::{AnchorConfig, InMemoryLedger, LedgerAnchor, LedgerBackend};
use resume_trust::models::{Claim, ClaimContext, ClaimType, DateRange, SourceResult};
use resume_trust::sources::{SourceKind, VerificationSource};
use resume_trust::verification::SourceRegistry;
use resume_trust::{PipelineConfig, VerificationPipeline};

/// What a [`StubSource`] does when called.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer with this score and confidence.
    Answer { score: f64, confidence: f64 },
    /// Never answer.
    Hang,
    /// Return an error result for the first `n` calls, then answer.
    FailThenAnswer { failures: u32, score: f64, confidence: f64 },
    /// Always return an error result.
    Fail,
}

/// Tracks how many calls are in flight across every source sharing it.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl ConcurrencyProbe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A scripted verification source.
pub struct StubSource {
    pub kind: SourceKind,
    pub supported: Vec<ClaimType>,
    pub behavior: Behavior,
    pub delay: Duration,
    pub calls: AtomicU32,
    pub probe: Arc<ConcurrencyProbe>,
}

#[allow(dead_code)]
impl StubSource {
    pub fn new(kind: SourceKind, supported: &[ClaimType], behavior: Behavior) -> Self {
        Self {
            kind,
            supported: supported.to_vec(),
            behavior,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            probe: Arc::new(ConcurrencyProbe::default()),
        }
    }

    pub fn answering(kind: SourceKind, supported: &[ClaimType], score: f64, confidence: f64) -> Self {
        Self::new(kind, supported, Behavior::Answer { score, confidence })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationSource for StubSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn supports(&self, claim_type: ClaimType) -> bool {
        self.supported.contains(&claim_type)
    }

    async fn verify(&self, claim: &Claim, _deadline: Instant) -> SourceResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = match &self.behavior {
            Behavior::Answer { score, confidence } => {
                SourceResult::ok(self.kind, &claim.id, *score, *confidence, json!({ "stub": true }))
            }
            // The caller's deadline drops this future; the probe stays entered.
            Behavior::Hang => std::future::pending::<SourceResult>().await,
            Behavior::FailThenAnswer {
                failures,
                score,
                confidence,
            } => {
                if call < *failures {
                    SourceResult::error(self.kind, &claim.id, format!("scripted failure {}", call + 1))
                } else {
                    SourceResult::ok(self.kind, &claim.id, *score, *confidence, json!({ "call": call + 1 }))
                }
            }
            Behavior::Fail => SourceResult::error(self.kind, &claim.id, "scripted failure"),
        };
        self.probe.leave();
        result
    }
}

#[allow(dead_code)]
pub fn claim(id: &str, claim_type: ClaimType, text: &str) -> Claim {
    Claim {
        id: id.into(),
        claim_type,
        text: text.into(),
        stated_confidence: 0.9,
        resume_id: "R1".into(),
        dates: None,
        context: ClaimContext::default(),
    }
}

#[allow(dead_code)]
pub fn experience(id: &str, start: &str, end: Option<&str>) -> Claim {
    let mut c = claim(id, ClaimType::Experience, "Senior Engineer at Initech");
    c.dates = Some(DateRange {
        start: start.parse().expect("valid start date"),
        end: end.map(|e| e.parse().expect("valid end date")),
        full_time: true,
    });
    c
}

/// The bundled model artifact.
#[allow(dead_code)]
pub fn default_model() -> Arc<dyn TrustModel> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/models/claim-trust-v1.json");
    Arc::new(ModelArtifact::load(path).expect("bundled model loads"))
}

#[allow(dead_code)]
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.orchestrator.per_source_timeout = Duration::from_millis(300);
    config.orchestrator.backoff = Duration::from_millis(5);
    config.orchestrator.claim_deadline = Duration::from_secs(2);
    config.resume_deadline = Duration::from_secs(5);
    config
}

/// A pipeline with in-memory storage and register, exposed for assertions.
#[allow(dead_code)]
pub struct TestPipeline {
    pub pipeline: VerificationPipeline,
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<InMemoryLedger>,
}

#[allow(dead_code)]
pub fn build_pipeline(registry: SourceRegistry, config: PipelineConfig) -> TestPipeline {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let anchor = LedgerAnchor::new(ledger.clone(), anchor_config());
    let pipeline = VerificationPipeline::new(registry, default_model(), store.clone(), anchor, config);
    TestPipeline {
        pipeline,
        store,
        ledger,
    }
}

#[allow(dead_code)]
pub fn build_pipeline_with_backend(
    registry: SourceRegistry,
    config: PipelineConfig,
    backend: Arc<dyn LedgerBackend>,
) -> VerificationPipeline {
    let store: Arc<dyn VerificationStore> = Arc::new(MemoryStore::new());
    let anchor = LedgerAnchor::new(backend, anchor_config());
    VerificationPipeline::new(registry, default_model(), store, anchor, config)
}

/// A pipeline over a caller-supplied store, with an in-memory register.
#[allow(dead_code)]
pub fn build_pipeline_with_store(
    registry: SourceRegistry,
    config: PipelineConfig,
    store: Arc<dyn VerificationStore>,
) -> (VerificationPipeline, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let anchor = LedgerAnchor::new(ledger.clone(), anchor_config());
    let pipeline = VerificationPipeline::new(registry, default_model(), store, anchor, config);
    (pipeline, ledger)
}

fn anchor_config() -> AnchorConfig {
    AnchorConfig {
        max_attempts: 2,
        backoff: Duration::from_millis(1),
    }
}

/// Connect to the test database when `TEST_DATABASE_URL` is set.
#[allow(dead_code)]
pub async fn setup_test_store() -> Option<PgStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = resume_trust::db::init_pool(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::query("DELETE FROM claim_assessments").execute(&pool).await.ok();
    sqlx::query("DELETE FROM trust_scores").execute(&pool).await.ok();
    sqlx::query("DELETE FROM ledger_records").execute(&pool).await.ok();

    Some(PgStore::new(pool))
}
