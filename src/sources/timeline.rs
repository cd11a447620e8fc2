use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use tokio::time::Instant;

use crate::models::{Claim, ClaimType, DateRange, SourceResult};

use super::{within_deadline, SourceError, SourceKind, VerificationSource};

const MAX_PLAUSIBLE_SPAN_DAYS: i64 = 50 * 365;

/// Local consistency check of a claim's own structured dates.
///
/// Cross-claim overlap is a resume-level property and lives in the feature
/// builder; this source only judges one range in isolation.
#[derive(Debug, Clone, Default)]
pub struct TimelineSource;

impl TimelineSource {
    pub fn new() -> Self {
        Self
    }

    fn score(&self, claim: &Claim) -> Result<SourceResult, SourceError> {
        let range = claim
            .dates
            .as_ref()
            .ok_or(SourceError::MissingHandle("structured dates"))?;
        let issues = timeline_issues(range, Utc::now().date_naive());
        let score = (1.0 - 0.5 * issues.len() as f64).max(0.0);

        Ok(SourceResult::ok(
            SourceKind::Timeline,
            &claim.id,
            score,
            0.9,
            json!({ "issues": issues }),
        ))
    }
}

#[async_trait]
impl VerificationSource for TimelineSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Timeline
    }

    fn supports(&self, claim_type: ClaimType) -> bool {
        claim_type.is_dated()
    }

    async fn verify(&self, claim: &Claim, deadline: Instant) -> SourceResult {
        within_deadline(self.kind(), claim, deadline, async { self.score(claim) }).await
    }
}

pub fn timeline_issues(range: &DateRange, today: NaiveDate) -> Vec<&'static str> {
    let mut issues = Vec::new();
    if range.is_inverted() {
        issues.push("end_before_start");
    }
    if range.start > today {
        issues.push("starts_in_future");
    }
    let end = range.end.unwrap_or(today);
    if (end - range.start).num_days() > MAX_PLAUSIBLE_SPAN_DAYS {
        issues.push("implausible_span");
    }
    issues
}
