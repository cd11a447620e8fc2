mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use common::{
    build_pipeline, build_pipeline_with_backend, build_pipeline_with_store, claim, experience,
    fast_config, Behavior, StubSource,
};
use resume_trust::db::{MemoryStore, VerificationStore};
use resume_trust::intelligence::features::{available_index, EVIDENCE_COVERAGE, TIMELINE_VIOLATION};
use resume_trust::intelligence::SENTINEL;
use resume_trust::ledger::{content_hash, LedgerBackend, LedgerBackendError};
use resume_trust::models::{
    AnchorMetadata, AnchorOutcome, Claim, ClaimAssessment, ClaimType, EvidenceStatus, Explanation,
    Label, LedgerRecord, RegisterEntry, TrustScore,
};
use resume_trust::services::{JobStatus, JobTracker};
use resume_trust::sources::{SkillAssessmentSource, SourceKind, TimelineSource};
use resume_trust::verification::SourceRegistry;
use resume_trust::PipelineError;

fn python_claim() -> Claim {
    let mut c = claim("S1", ClaimType::Skill, "Python");
    c.context.github_username = Some("octocat".into());
    c.context.assessment_responses = vec!["3".into(), "def".into(), "tuple".into()];
    c
}

fn skill_registry() -> SourceRegistry {
    SourceRegistry::new(4)
        .with_source(Arc::new(StubSource::answering(
            SourceKind::CodeHosting,
            &[ClaimType::Skill, ClaimType::Project],
            0.9,
            0.9,
        )))
        .with_source(Arc::new(SkillAssessmentSource::default()))
}

#[tokio::test]
async fn test_corroborated_python_skill_is_verified() {
    let t = build_pipeline(skill_registry(), fast_config());

    let report = t
        .pipeline
        .run_verification("R1", &[python_claim()])
        .await
        .expect("verification succeeds");

    let assessment = report.assessment("S1").expect("assessment for S1");
    assert_eq!(assessment.prediction.label, Label::Verified);
    assert_eq!(assessment.evidence_status, EvidenceStatus::Corroborated);
    assert_eq!(assessment.source_results.len(), 2);
    assert!(report.trust_score.overall_score > 90.0);
    assert!(report.partial.is_none());
}

#[tokio::test]
async fn test_overlapping_roles_raise_suspicion() {
    let registry = || SourceRegistry::new(4).with_source(Arc::new(TimelineSource::new()));

    let mut e1 = experience("E1", "2018-01-01", Some("2020-01-01"));
    e1.text = "Backend Engineer at Initech".into();
    let mut e2 = experience("E2", "2020-01-01", Some("2022-01-01"));
    e2.text = "Staff Engineer at Globex".into();
    let baseline = build_pipeline(registry(), fast_config())
        .pipeline
        .run_verification("R1", &[e1.clone(), e2.clone()])
        .await
        .unwrap();

    e1.dates = experience("E1", "2018-01-01", Some("2021-01-01")).dates;
    let overlapping = build_pipeline(registry(), fast_config())
        .pipeline
        .run_verification("R1", &[e1, e2])
        .await
        .unwrap();

    let before = baseline.assessment("E1").unwrap();
    let after = overlapping.assessment("E1").unwrap();
    assert_eq!(before.features.values[TIMELINE_VIOLATION], 0.0);
    assert_eq!(after.features.values[TIMELINE_VIOLATION], 1.0);

    let suspicion = |p: &resume_trust::models::ClassProbabilities| p.doubtful + p.fake;
    assert!(suspicion(&after.prediction.probabilities) > suspicion(&before.prediction.probabilities));
    assert!(overlapping.trust_score.overall_score < baseline.trust_score.overall_score);
}

#[tokio::test]
async fn test_claim_without_sources_is_unverifiable_not_fake() {
    let t = build_pipeline(SourceRegistry::new(4), fast_config());
    let c = claim("C1", ClaimType::Certification, "AWS Certified Solutions Architect");

    let report = t.pipeline.run_verification("R1", &[c]).await.unwrap();

    let assessment = report.assessment("C1").unwrap();
    assert!(assessment.source_results.is_empty());
    assert_eq!(assessment.evidence_status, EvidenceStatus::Unverifiable);
    assert_eq!(assessment.features.values[EVIDENCE_COVERAGE], SENTINEL);
    assert_ne!(assessment.prediction.label, Label::Fake);
}

#[tokio::test]
async fn test_unreachable_sources_are_not_reported_as_fake() {
    let registry = SourceRegistry::new(4)
        .with_source(Arc::new(StubSource::new(SourceKind::CodeHosting, &[ClaimType::Skill], Behavior::Fail)))
        .with_source(Arc::new(StubSource::new(SourceKind::SkillAssessment, &[ClaimType::Skill], Behavior::Fail)));
    let t = build_pipeline(registry, fast_config());

    let report = t
        .pipeline
        .run_verification("R1", &[claim("S1", ClaimType::Skill, "Rust")])
        .await
        .unwrap();

    let assessment = report.assessment("S1").unwrap();
    assert_eq!(assessment.evidence_status, EvidenceStatus::InfrastructureUnavailable);
    assert_eq!(assessment.features.values[available_index(SourceKind::CodeHosting)], 0.0);
    assert_eq!(assessment.prediction.label, Label::Doubtful);
}

#[tokio::test]
async fn test_repeated_runs_are_deterministic() {
    let t = build_pipeline(skill_registry(), fast_config());
    let claims = vec![
        python_claim(),
        claim("P1", ClaimType::Project, "Built a Rust compiler plugin"),
        experience("E1", "2019-05-01", None),
    ];

    let first = t.pipeline.run_verification("R1", &claims).await.unwrap();
    let second = t.pipeline.run_verification("R1", &claims).await.unwrap();

    assert_eq!(first.trust_score.overall_score, second.trust_score.overall_score);
    for (a, b) in first.assessments.iter().zip(&second.assessments) {
        assert_eq!(a.claim_id, b.claim_id);
        assert_eq!(a.features.values, b.features.values);
        assert_eq!(a.prediction.feature_digest, b.prediction.feature_digest);
        assert_eq!(a.prediction.probabilities, b.prediction.probabilities);
        assert_eq!(a.explanation.contributions, b.explanation.contributions);
    }
}

#[tokio::test]
async fn test_explanations_are_additive() {
    let t = build_pipeline(skill_registry(), fast_config());
    let claims = vec![
        python_claim(),
        claim("P1", ClaimType::Project, "Built a Rust compiler plugin"),
        claim("C1", ClaimType::Certification, "CKA"),
    ];

    let report = t.pipeline.run_verification("R1", &claims).await.unwrap();

    for a in &report.assessments {
        let e = &a.explanation;
        let gap = e.prediction_score - e.baseline_score;
        assert!(
            (e.total_contribution() - gap).abs() < 1e-6,
            "claim {}: {} vs {gap}",
            a.claim_id,
            e.total_contribution()
        );
        assert_eq!(e.feature_digest, a.prediction.feature_digest);
        assert_eq!(e.label, a.prediction.label);
    }
}

#[tokio::test]
async fn test_resume_deadline_yields_partial_report() {
    let registry = SourceRegistry::new(4)
        .with_source(Arc::new(StubSource::answering(
            SourceKind::CodeHosting,
            &[ClaimType::Skill],
            0.9,
            0.9,
        )))
        .with_source(Arc::new(StubSource::new(
            SourceKind::Certificate,
            &[ClaimType::Certification],
            Behavior::Hang,
        )));
    let mut config = fast_config();
    config.orchestrator.per_source_timeout = Duration::from_secs(10);
    config.orchestrator.claim_deadline = Duration::from_secs(10);
    config.resume_deadline = Duration::from_millis(200);
    let t = build_pipeline(registry, config);

    let claims = vec![
        claim("S1", ClaimType::Skill, "Python"),
        claim("C1", ClaimType::Certification, "CKA"),
    ];
    let started = std::time::Instant::now();
    let report = t.pipeline.run_verification("R1", &claims).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    let partial = report.partial.expect("partial verification");
    assert_eq!(partial.completed, vec!["S1".to_string()]);
    assert_eq!(partial.pending, vec!["C1".to_string()]);
    assert_eq!(report.trust_score.claim_ids, vec!["S1".to_string()]);
}

#[tokio::test]
async fn test_nothing_finished_is_an_error() {
    let registry = SourceRegistry::new(4).with_source(Arc::new(StubSource::new(
        SourceKind::Certificate,
        &[ClaimType::Certification],
        Behavior::Hang,
    )));
    let mut config = fast_config();
    config.orchestrator.per_source_timeout = Duration::from_secs(10);
    config.orchestrator.claim_deadline = Duration::from_secs(10);
    config.resume_deadline = Duration::from_millis(100);
    let t = build_pipeline(registry, config);

    let err = t
        .pipeline
        .run_verification("R1", &[claim("C1", ClaimType::Certification, "CKA")])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyVerificationSet(_)));
}

#[tokio::test]
async fn test_claims_from_another_resume_are_rejected() {
    let t = build_pipeline(skill_registry(), fast_config());
    let mut foreign = python_claim();
    foreign.resume_id = "R2".into();

    let err = t.pipeline.run_verification("R1", &[foreign]).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidClaim(_)));
}

#[tokio::test]
async fn test_anchor_round_trip_preserves_score() {
    let t = build_pipeline(skill_registry(), fast_config());

    let report = t.pipeline.run_verification("R1", &[python_claim()]).await.unwrap();

    let record = match &report.anchor {
        AnchorOutcome::Anchored { record } => record.clone(),
        AnchorOutcome::Failed { reason } => panic!("anchoring failed: {reason}"),
    };
    assert_eq!(record.content_hash, content_hash(&report.trust_score));

    let entry = t.ledger.lookup(&record.content_hash).await.unwrap().expect("register entry");
    assert_eq!(entry.metadata.overall_score, report.trust_score.overall_score);
    assert_eq!(entry.metadata.resume_id, "R1");

    let stored = t.pipeline.get_ledger_record("R1").await.unwrap();
    assert_eq!(stored, Some(record));
}

struct UnreachableRegister;

#[async_trait]
impl LedgerBackend for UnreachableRegister {
    fn backend_id(&self) -> &str {
        "unreachable"
    }

    async fn submit(&self, _: &str, _: &AnchorMetadata) -> Result<String, LedgerBackendError> {
        Err(LedgerBackendError::Rejected("register offline".into()))
    }

    async fn lookup(&self, _: &str) -> Result<Option<RegisterEntry>, LedgerBackendError> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_anchor_failure_keeps_trust_score() {
    let pipeline = build_pipeline_with_backend(skill_registry(), fast_config(), Arc::new(UnreachableRegister));

    let report = pipeline.run_verification("R1", &[python_claim()]).await.unwrap();

    assert!(matches!(report.anchor, AnchorOutcome::Failed { .. }));
    assert!(report.trust_score.overall_score > 0.0);
    assert!(pipeline.get_ledger_record("R1").await.unwrap().is_none());
    assert_eq!(
        pipeline.get_trust_score("R1").await.unwrap(),
        Some(report.trust_score)
    );
}

/// Memory store whose ledger-record writes always fail.
struct LedgerWriteFails {
    inner: MemoryStore,
}

#[async_trait]
impl VerificationStore for LedgerWriteFails {
    async fn save_assessment(&self, resume_id: &str, assessment: &ClaimAssessment) -> anyhow::Result<()> {
        self.inner.save_assessment(resume_id, assessment).await
    }

    async fn save_trust_score(&self, run_id: Uuid, score: &TrustScore) -> anyhow::Result<()> {
        self.inner.save_trust_score(run_id, score).await
    }

    async fn save_ledger_record(&self, _: &str, _: &LedgerRecord) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    async fn latest_explanation(&self, claim_id: &str) -> anyhow::Result<Option<Explanation>> {
        self.inner.latest_explanation(claim_id).await
    }

    async fn latest_trust_score(&self, resume_id: &str) -> anyhow::Result<Option<TrustScore>> {
        self.inner.latest_trust_score(resume_id).await
    }

    async fn ledger_record(&self, resume_id: &str) -> anyhow::Result<Option<LedgerRecord>> {
        self.inner.ledger_record(resume_id).await
    }
}

#[tokio::test]
async fn test_ledger_record_write_failure_keeps_anchored_score() {
    let store = Arc::new(LedgerWriteFails {
        inner: MemoryStore::new(),
    });
    let (pipeline, ledger) = build_pipeline_with_store(skill_registry(), fast_config(), store);

    let report = pipeline
        .run_verification("R1", &[python_claim()])
        .await
        .expect("trust score survives a failed ledger-record write");

    let AnchorOutcome::Anchored { record } = &report.anchor else {
        panic!("expected anchored outcome, got {:?}", report.anchor);
    };
    assert_eq!(record.content_hash, content_hash(&report.trust_score));
    assert_eq!(ledger.len().await, 1);
    assert_eq!(
        pipeline.get_trust_score("R1").await.unwrap(),
        Some(report.trust_score.clone())
    );
    assert!(pipeline.get_ledger_record("R1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_explanation_lookup_returns_latest_run() {
    let t = build_pipeline(skill_registry(), fast_config());

    t.pipeline.run_verification("R1", &[python_claim()]).await.unwrap();
    let second = t.pipeline.run_verification("R1", &[python_claim()]).await.unwrap();

    let explanation = t.pipeline.get_explanation("S1").await.unwrap().expect("explanation");
    assert_eq!(&explanation, &second.assessment("S1").unwrap().explanation);
    assert_eq!(t.store.assessment_count().await, 2);
    assert!(t.pipeline.get_explanation("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_job_reaches_completed() {
    let t = build_pipeline(skill_registry(), fast_config());
    let tracker = JobTracker::new(Arc::new(t.pipeline));

    let mut handle = tracker.submit("R1".into(), vec![python_claim()]).await;
    let state = handle.wait_terminal().await.unwrap();

    assert_eq!(state.status, JobStatus::Completed);
    assert!(state.report.is_some());
    assert_eq!(tracker.status(handle.id).await.map(|s| s.status), Some(JobStatus::Completed));
}

#[tokio::test]
async fn test_job_fails_on_invalid_input() {
    let t = build_pipeline(skill_registry(), fast_config());
    let tracker = JobTracker::new(Arc::new(t.pipeline));
    let mut foreign = python_claim();
    foreign.resume_id = "R9".into();

    let mut handle = tracker.submit("R1".into(), vec![foreign]).await;
    let state = handle.wait_terminal().await.unwrap();

    assert_eq!(state.status, JobStatus::Failed);
    assert!(state.error.unwrap().starts_with("invalid_claim"));
}

#[tokio::test]
async fn test_finished_jobs_beyond_retention_are_evicted() {
    let t = build_pipeline(skill_registry(), fast_config());
    let tracker = JobTracker::with_retention(Arc::new(t.pipeline), 1);

    for _ in 0..3 {
        let mut handle = tracker.submit("R1".into(), vec![python_claim()]).await;
        handle.wait_terminal().await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(2), async {
        while tracker.len().await > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("finished jobs evicted down to the retention limit");
    assert_eq!(tracker.len().await, 1);
}

#[tokio::test]
async fn test_pg_store_round_trip() {
    let Some(store) = common::setup_test_store().await else {
        return;
    };
    let t = build_pipeline(skill_registry(), fast_config());
    let report = t.pipeline.run_verification("R1", &[python_claim()]).await.unwrap();

    for a in &report.assessments {
        store.save_assessment("R1", a).await.unwrap();
    }
    store.save_trust_score(report.run_id, &report.trust_score).await.unwrap();

    let explanation = store.latest_explanation("S1").await.unwrap();
    assert_eq!(explanation.as_ref(), Some(&report.assessment("S1").unwrap().explanation));
    let score = store.latest_trust_score("R1").await.unwrap().unwrap();
    assert_eq!(score.overall_score, report.trust_score.overall_score);
}
