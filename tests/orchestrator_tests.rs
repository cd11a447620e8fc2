mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use common::{claim, Behavior, ConcurrencyProbe, StubSource};
use resume_trust::models::{ClaimType, SourceStatus};
use resume_trust::sources::SourceKind;
use resume_trust::verification::{verify_claim, OrchestratorConfig, SourceRegistry};

const ALL_TYPES: &[ClaimType] = &ClaimType::ALL;

fn config(per_source_ms: u64, max_retries: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        per_source_timeout: Duration::from_millis(per_source_ms),
        max_retries,
        backoff: Duration::from_millis(2),
        max_concurrency: 4,
        claim_deadline: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_hanging_source_is_isolated() {
    let registry = SourceRegistry::new(4)
        .with_source(Arc::new(StubSource::answering(SourceKind::CodeHosting, ALL_TYPES, 0.8, 0.9)))
        .with_source(Arc::new(StubSource::new(SourceKind::SkillAssessment, ALL_TYPES, Behavior::Hang)));
    let c = claim("S1", ClaimType::Skill, "Rust");

    let started = std::time::Instant::now();
    let results = verify_claim(&c, &registry, &config(200, 0)).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(200) + Duration::from_millis(800), "took {elapsed:?}");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].source, SourceKind::CodeHosting);
    assert_eq!(results[0].status, SourceStatus::Ok);
    assert_eq!(results[1].source, SourceKind::SkillAssessment);
    assert_eq!(results[1].status, SourceStatus::Timeout);
}

#[tokio::test]
async fn test_retry_keeps_only_final_attempt() {
    let stub = Arc::new(StubSource::new(
        SourceKind::Certificate,
        ALL_TYPES,
        Behavior::FailThenAnswer {
            failures: 2,
            score: 0.7,
            confidence: 0.95,
        },
    ));
    let registry = SourceRegistry::new(4).with_source(stub.clone());
    let c = claim("C1", ClaimType::Certification, "AWS Solutions Architect");

    let results = verify_claim(&c, &registry, &config(1_000, 2)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, SourceStatus::Ok);
    assert_eq!(results[0].attempts, 3);
    assert_eq!(results[0].evidence["call"], 3);
    assert_eq!(stub.call_count(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_report_last_error() {
    let stub = Arc::new(StubSource::new(SourceKind::Timeline, ALL_TYPES, Behavior::Fail));
    let registry = SourceRegistry::new(4).with_source(stub.clone());
    let c = claim("E1", ClaimType::Experience, "Engineer");

    let results = verify_claim(&c, &registry, &config(1_000, 2)).await;

    assert_eq!(results[0].status, SourceStatus::Error);
    assert_eq!(results[0].attempts, 3);
    assert_eq!(stub.call_count(), 3);
}

#[tokio::test]
async fn test_retries_share_one_budget() {
    // Each attempt hangs; with two retries the whole budget is still 300ms.
    let stub = Arc::new(StubSource::new(SourceKind::CodeHosting, ALL_TYPES, Behavior::Hang));
    let registry = SourceRegistry::new(4).with_source(stub.clone());
    let c = claim("S1", ClaimType::Skill, "Go");

    let started = std::time::Instant::now();
    let results = verify_claim(&c, &registry, &config(300, 2)).await;

    assert!(started.elapsed() < Duration::from_millis(1_000));
    assert_eq!(results[0].status, SourceStatus::Timeout);
    assert!(stub.call_count() >= 1);
}

#[tokio::test]
async fn test_max_concurrency_respected() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let mut registry = SourceRegistry::new(4);
    for kind in SourceKind::ALL {
        registry.register(Arc::new(
            StubSource::answering(kind, ALL_TYPES, 0.5, 0.5)
                .with_delay(Duration::from_millis(40))
                .with_probe(probe.clone()),
        ));
    }
    let c = claim("P1", ClaimType::Project, "Compiler");
    let mut cfg = config(1_000, 0);
    cfg.max_concurrency = 2;

    let results = verify_claim(&c, &registry, &cfg).await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.status == SourceStatus::Ok));
    assert!(probe.peak() <= 2, "peak {}", probe.peak());
    assert_eq!(
        results.iter().map(|r| r.source).collect::<Vec<_>>(),
        SourceKind::ALL.to_vec()
    );
}

#[tokio::test]
async fn test_rate_limiter_shared_across_claims() {
    let stub = StubSource::answering(SourceKind::CodeHosting, ALL_TYPES, 0.9, 0.9)
        .with_delay(Duration::from_millis(30));
    let probe = stub.probe.clone();
    let mut registry = SourceRegistry::new(4);
    registry.register_with_limit(Arc::new(stub), 1);

    let claims: Vec<_> = (0..4)
        .map(|i| claim(&format!("S{i}"), ClaimType::Skill, "Rust"))
        .collect();
    let cfg = config(2_000, 0);
    let all = join_all(claims.iter().map(|c| verify_claim(c, &registry, &cfg))).await;

    assert!(all.iter().flatten().all(|r| r.status == SourceStatus::Ok));
    assert_eq!(probe.peak(), 1);
}

#[tokio::test]
async fn test_claim_deadline_cancels_outstanding_sources() {
    let registry = SourceRegistry::new(4)
        .with_source(Arc::new(StubSource::new(SourceKind::Timeline, ALL_TYPES, Behavior::Hang)));
    let c = claim("E1", ClaimType::Experience, "Engineer");
    let mut cfg = config(10_000, 0);
    cfg.claim_deadline = Duration::from_millis(100);

    let started = std::time::Instant::now();
    let results = verify_claim(&c, &registry, &cfg).await;

    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, SourceStatus::Timeout);
}

#[tokio::test]
async fn test_unsupported_claim_type_yields_nothing() {
    let registry = SourceRegistry::new(4).with_source(Arc::new(StubSource::answering(
        SourceKind::CodeHosting,
        &[ClaimType::Skill],
        0.9,
        0.9,
    )));
    let c = claim("D1", ClaimType::Education, "BSc Computer Science");
    assert!(verify_claim(&c, &registry, &config(100, 0)).await.is_empty());
}

#[tokio::test]
async fn test_abandoned_sources_report_time_since_dispatch() {
    let registry = SourceRegistry::new(4)
        .with_source(Arc::new(StubSource::new(SourceKind::CodeHosting, ALL_TYPES, Behavior::Hang)))
        .with_source(Arc::new(StubSource::new(SourceKind::SkillAssessment, ALL_TYPES, Behavior::Hang)));
    let c = claim("S1", ClaimType::Skill, "Rust");
    let config = OrchestratorConfig {
        per_source_timeout: Duration::from_secs(10),
        max_retries: 0,
        backoff: Duration::from_millis(2),
        max_concurrency: 1,
        claim_deadline: Duration::from_millis(150),
    };

    let results = verify_claim(&c, &registry, &config).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == SourceStatus::Timeout));
    // The first source ran for the whole claim deadline; the second waited
    // behind max_concurrency and got at most a moment of wall time.
    assert!(results[0].latency_ms >= 140, "latency {}", results[0].latency_ms);
    assert!(results[1].latency_ms < 100, "latency {}", results[1].latency_ms);
}
