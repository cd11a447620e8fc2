use std::sync::OnceLock;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use metrics::{counter, histogram};
use tokio::time::{sleep, sleep_until, Instant};

use crate::models::{Claim, SourceResult};

use super::registry::{RegisteredSource, SourceRegistry};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Budget for all attempts against one source.
    pub per_source_timeout: Duration,
    pub max_retries: u32,
    /// Base backoff; attempt n waits `backoff * 2^(n-1)`.
    pub backoff: Duration,
    /// Sources in flight at once for one claim.
    pub max_concurrency: usize,
    pub claim_deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            per_source_timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff: Duration::from_millis(100),
            max_concurrency: 4,
            claim_deadline: Duration::from_secs(15),
        }
    }
}

impl OrchestratorConfig {
    fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn attempt_slice(&self) -> Duration {
        self.per_source_timeout / self.total_attempts()
    }

    fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exp)
    }
}

/// Run every applicable source for `claim` and return one result per source,
/// in slot order.
///
/// Sources still running when the claim deadline passes are reported as
/// timeouts, with latency measured from their dispatch. Dropping their
/// futures cancels the outstanding calls of this claim only.
pub async fn verify_claim(
    claim: &Claim,
    registry: &SourceRegistry,
    config: &OrchestratorConfig,
) -> Vec<SourceResult> {
    let applicable = registry.applicable(claim.claim_type);
    if applicable.is_empty() {
        tracing::debug!(claim_id = %claim.id, claim_type = %claim.claim_type, "No applicable sources");
        return Vec::new();
    }

    let claim_deadline = Instant::now() + config.claim_deadline;
    let mut collected: Vec<Option<SourceResult>> = vec![None; applicable.len()];
    let dispatched: Vec<OnceLock<Instant>> = applicable.iter().map(|_| OnceLock::new()).collect();

    {
        let calls: Vec<BoxFuture<'_, (usize, SourceResult)>> = applicable
            .iter()
            .copied()
            .enumerate()
            .map(|(i, entry)| {
                let dispatched = &dispatched[i];
                async move {
                    dispatched.get_or_init(Instant::now);
                    (i, run_source(claim, entry, config, claim_deadline).await)
                }
                .boxed()
            })
            .collect();
        let mut pending = stream::iter(calls).buffer_unordered(config.max_concurrency.max(1));

        let cutoff = sleep_until(claim_deadline);
        tokio::pin!(cutoff);

        loop {
            tokio::select! {
                biased;
                next = pending.next() => match next {
                    Some((i, result)) => collected[i] = Some(result),
                    None => break,
                },
                _ = &mut cutoff => {
                    let outstanding = collected.iter().filter(|r| r.is_none()).count();
                    tracing::warn!(
                        claim_id = %claim.id,
                        outstanding,
                        "Claim deadline reached, abandoning outstanding sources"
                    );
                    break;
                }
            }
        }
    }

    collected
        .into_iter()
        .zip(applicable)
        .zip(&dispatched)
        .map(|((result, entry), dispatched)| {
            result.unwrap_or_else(|| {
                counter!("source_failures_total", "source" => entry.kind().as_str(), "status" => "timeout")
                    .increment(1);
                // Sources still queued behind max_concurrency never started.
                let latency = dispatched
                    .get()
                    .map(|started| started.elapsed())
                    .unwrap_or(Duration::ZERO);
                SourceResult::timeout(entry.kind(), &claim.id).with_latency(latency)
            })
        })
        .collect()
}

/// Attempt one source until it answers or its budget runs out. Only the final
/// attempt's result is returned.
async fn run_source(
    claim: &Claim,
    entry: &RegisteredSource,
    config: &OrchestratorConfig,
    claim_deadline: Instant,
) -> SourceResult {
    let kind = entry.kind();
    let started = Instant::now();
    let budget_end = (started + config.per_source_timeout).min(claim_deadline);
    let total = config.total_attempts();
    let slice = config.attempt_slice();

    let mut attempt = 0;
    let result = loop {
        attempt += 1;
        let is_final = attempt >= total;
        let deadline = if is_final {
            budget_end
        } else {
            (Instant::now() + slice).min(budget_end)
        };

        counter!("source_attempts_total", "source" => kind.as_str()).increment(1);
        let result = entry.call(claim, deadline).await;
        histogram!("source_latency_seconds", "source" => kind.as_str())
            .record(result.latency_ms as f64 / 1000.0);

        if result.is_ok() {
            break result;
        }

        counter!(
            "source_failures_total",
            "source" => kind.as_str(),
            "status" => result.status.as_str()
        )
        .increment(1);
        tracing::debug!(
            claim_id = %claim.id,
            source = %kind,
            attempt,
            status = %result.status,
            "Source attempt failed"
        );

        if is_final {
            break result;
        }
        let wait = config.backoff_after(attempt);
        if Instant::now() + wait >= budget_end {
            break result;
        }
        sleep(wait).await;
    };

    if !result.is_ok() {
        tracing::warn!(
            claim_id = %claim.id,
            source = %kind,
            attempts = attempt,
            status = %result.status,
            "Source gave no signal"
        );
    }
    result.with_attempts(attempt)
}
