use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use metrics::{counter, histogram};
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use crate::db::VerificationStore;
use crate::errors::PipelineError;
use crate::intelligence::explainer::DEFAULT_TOP_K;
use crate::intelligence::{aggregate, Classifier, Explainer, FeatureBuilder, TrustModel};
use crate::ledger::LedgerAnchor;
use crate::models::{
    AnchorOutcome, Claim, ClaimAssessment, EvidenceStatus, Explanation, LedgerRecord,
    PartialVerification, TrustScore, VerificationReport,
};
use crate::verification::{verify_claim, OrchestratorConfig, SourceRegistry};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub orchestrator: OrchestratorConfig,
    /// Claims of one resume processed at once.
    pub max_concurrent_claims: usize,
    /// Claims not finished by then are reported as pending.
    pub resume_deadline: Duration,
    pub explain_top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            max_concurrent_claims: 8,
            resume_deadline: Duration::from_secs(60),
            explain_top_k: DEFAULT_TOP_K,
        }
    }
}

/// Entry point: verifies the claims of one resume end to end.
#[derive(Clone)]
pub struct VerificationPipeline {
    registry: Arc<SourceRegistry>,
    classifier: Classifier,
    explainer: Explainer,
    store: Arc<dyn VerificationStore>,
    anchor: LedgerAnchor,
    config: PipelineConfig,
}

impl VerificationPipeline {
    pub fn new(
        registry: SourceRegistry,
        model: Arc<dyn TrustModel>,
        store: Arc<dyn VerificationStore>,
        anchor: LedgerAnchor,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            classifier: Classifier::new(model.clone()),
            explainer: Explainer::new(model, config.explain_top_k),
            store,
            anchor,
            config,
        }
    }

    pub fn model_version(&self) -> &str {
        self.classifier.model_version()
    }

    /// Verify, classify, explain and aggregate every claim, then persist the
    /// results and anchor the trust score.
    ///
    /// Anchoring is best effort: a register failure, or a failure to store
    /// the ledger record, never discards the trust score.
    pub async fn run_verification(
        &self,
        resume_id: &str,
        claims: &[Claim],
    ) -> Result<VerificationReport, PipelineError> {
        let started = std::time::Instant::now();
        validate(resume_id, claims)?;

        let run_id = Uuid::new_v4();
        tracing::info!(
            resume_id = %resume_id,
            run_id = %run_id,
            claims = claims.len(),
            model_version = %self.model_version(),
            "Verification run started"
        );

        let (assessments, partial) = self.assess_all(run_id, claims).await;

        if assessments.is_empty() {
            tracing::warn!(resume_id = %resume_id, "No claim finished verification");
            return Err(PipelineError::EmptyVerificationSet(resume_id.to_string()));
        }

        let predictions: Vec<_> = assessments.iter().map(|a| a.prediction.clone()).collect();
        let trust_score = aggregate(resume_id, &predictions)
            .map_err(|e| PipelineError::from_aggregation(resume_id, e))?;

        for assessment in &assessments {
            self.store.save_assessment(resume_id, assessment).await?;
        }
        self.store.save_trust_score(run_id, &trust_score).await?;

        let anchor = match self.anchor.anchor(&trust_score).await {
            Ok(record) => {
                // The register already holds the entry; a lost local copy can
                // be recovered with `LedgerAnchor::lookup`.
                if let Err(e) = self.store.save_ledger_record(resume_id, &record).await {
                    tracing::warn!(
                        resume_id = %resume_id,
                        content_hash = %record.content_hash,
                        error = %e,
                        "Anchored trust score but failed to store ledger record"
                    );
                }
                AnchorOutcome::Anchored { record }
            }
            Err(e) => {
                tracing::warn!(
                    resume_id = %resume_id,
                    error = %e,
                    "Trust score left unanchored"
                );
                AnchorOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if partial.is_some() {
            counter!("partial_verifications_total").increment(1);
        }
        counter!("resumes_verified_total").increment(1);
        histogram!("pipeline_latency_seconds").record(started.elapsed().as_secs_f64());

        tracing::info!(
            resume_id = %resume_id,
            run_id = %run_id,
            overall_score = trust_score.overall_score,
            verified = trust_score.label_counts.verified,
            doubtful = trust_score.label_counts.doubtful,
            fake = trust_score.label_counts.fake,
            partial = partial.is_some(),
            "Verification run finished"
        );

        Ok(VerificationReport {
            run_id,
            trust_score,
            assessments,
            partial,
            anchor,
        })
    }

    /// Explanation from the most recent run that assessed `claim_id`.
    pub async fn get_explanation(&self, claim_id: &str) -> Result<Option<Explanation>, PipelineError> {
        Ok(self.store.latest_explanation(claim_id).await?)
    }

    pub async fn get_ledger_record(&self, resume_id: &str) -> Result<Option<LedgerRecord>, PipelineError> {
        Ok(self.store.ledger_record(resume_id).await?)
    }

    pub async fn get_trust_score(&self, resume_id: &str) -> Result<Option<TrustScore>, PipelineError> {
        Ok(self.store.latest_trust_score(resume_id).await?)
    }

    /// Assess claims concurrently until done or the resume deadline passes.
    /// Finished assessments come back in claim order.
    async fn assess_all(
        &self,
        run_id: Uuid,
        claims: &[Claim],
    ) -> (Vec<ClaimAssessment>, Option<PartialVerification>) {
        let builder = FeatureBuilder::new(claims);
        let deadline = Instant::now() + self.config.resume_deadline;
        let mut finished: Vec<Option<ClaimAssessment>> = vec![None; claims.len()];

        {
            let builder = &builder;
            let work: Vec<BoxFuture<'_, (usize, ClaimAssessment)>> = claims
                .iter()
                .enumerate()
                .map(|(i, claim)| {
                    async move { (i, self.assess_claim(run_id, claim, builder).await) }.boxed()
                })
                .collect();
            let mut running =
                stream::iter(work).buffer_unordered(self.config.max_concurrent_claims.max(1));

            let cutoff = sleep_until(deadline);
            tokio::pin!(cutoff);

            loop {
                tokio::select! {
                    biased;
                    next = running.next() => match next {
                        Some((i, assessment)) => finished[i] = Some(assessment),
                        None => break,
                    },
                    _ = &mut cutoff => break,
                }
            }
        }

        let pending: Vec<String> = claims
            .iter()
            .zip(&finished)
            .filter(|(_, a)| a.is_none())
            .map(|(c, _)| c.id.clone())
            .collect();
        let assessments: Vec<ClaimAssessment> = finished.into_iter().flatten().collect();

        let partial = if pending.is_empty() {
            None
        } else {
            tracing::warn!(
                completed = assessments.len(),
                pending = pending.len(),
                "Resume deadline reached, returning partial verification"
            );
            Some(PartialVerification {
                completed: assessments.iter().map(|a| a.claim_id.clone()).collect(),
                pending,
            })
        };

        (assessments, partial)
    }

    async fn assess_claim(
        &self,
        run_id: Uuid,
        claim: &Claim,
        builder: &FeatureBuilder,
    ) -> ClaimAssessment {
        let results = verify_claim(claim, &self.registry, &self.config.orchestrator).await;
        let evidence_status = EvidenceStatus::from_results(&results);
        let features = builder.build(claim, &results);
        let prediction = self.classifier.predict(&features);
        let explanation = self.explainer.explain(&features, &prediction);

        tracing::debug!(
            claim_id = %claim.id,
            label = %prediction.label,
            confidence = prediction.confidence,
            evidence = ?evidence_status,
            "Claim assessed"
        );

        ClaimAssessment {
            run_id,
            claim_id: claim.id.clone(),
            claim_type: claim.claim_type,
            evidence_status,
            source_results: results,
            features,
            prediction,
            explanation,
        }
    }
}

fn validate(resume_id: &str, claims: &[Claim]) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for claim in claims {
        if claim.id.trim().is_empty() {
            return Err(PipelineError::InvalidClaim("claim with empty id".into()));
        }
        if claim.resume_id != resume_id {
            return Err(PipelineError::InvalidClaim(format!(
                "claim {} belongs to resume {}, not {resume_id}",
                claim.id, claim.resume_id
            )));
        }
        if !seen.insert(claim.id.as_str()) {
            return Err(PipelineError::InvalidClaim(format!(
                "duplicate claim id {}",
                claim.id
            )));
        }
    }
    Ok(())
}
