use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::models::{Claim, ClaimType, DateRange, SourceResult};

use super::{token_overlap, within_deadline, SourceError, SourceKind, VerificationSource};

/// Start dates within this many days count as agreeing.
const DATE_TOLERANCE_DAYS: i64 = 90;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub positions: Vec<ProfileEntry>,
    #[serde(default)]
    pub education: Vec<ProfileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEntry {
    pub title: String,
    pub organization: String,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

/// Matches education and experience claims against a professional-network
/// profile served by a profile-lookup service.
#[derive(Debug, Clone)]
pub struct ProfessionalNetworkSource {
    http: Client,
    base_url: String,
}

impl ProfessionalNetworkSource {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a profile by slug. `Ok(None)` when the profile does not exist.
    pub async fn get_profile(&self, slug: &str) -> Result<Option<ProfileRecord>, SourceError> {
        let url = format!("{}/profiles/{}", self.base_url, slug);
        let resp = self.http.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let profile: ProfileRecord = resp.error_for_status()?.json().await?;
        Ok(Some(profile))
    }

    async fn score(&self, claim: &Claim) -> Result<SourceResult, SourceError> {
        let slug = claim
            .context
            .profile_url
            .as_deref()
            .and_then(profile_slug)
            .ok_or(SourceError::MissingHandle("profile url"))?;

        let Some(profile) = self.get_profile(&slug).await? else {
            return Ok(SourceResult::ok(
                SourceKind::ProfessionalNetwork,
                &claim.id,
                0.0,
                0.5,
                json!({ "profile": slug, "profile_found": false }),
            ));
        };

        let entries = match claim.claim_type {
            ClaimType::Education => &profile.education,
            _ => &profile.positions,
        };
        let best = best_match(claim, entries);
        let confidence = if entries.is_empty() { 0.5 } else { 0.8 };

        let (score, evidence) = match best {
            Some((entry, score)) => (
                score,
                json!({
                    "profile": slug,
                    "profile_found": true,
                    "matched_title": entry.title,
                    "matched_organization": entry.organization,
                }),
            ),
            None => (
                0.0,
                json!({ "profile": slug, "profile_found": true, "entries": 0 }),
            ),
        };

        Ok(SourceResult::ok(
            SourceKind::ProfessionalNetwork,
            &claim.id,
            score,
            confidence,
            evidence,
        ))
    }
}

#[async_trait]
impl VerificationSource for ProfessionalNetworkSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ProfessionalNetwork
    }

    fn supports(&self, claim_type: ClaimType) -> bool {
        matches!(claim_type, ClaimType::Education | ClaimType::Experience)
    }

    async fn verify(&self, claim: &Claim, deadline: Instant) -> SourceResult {
        within_deadline(self.kind(), claim, deadline, self.score(claim)).await
    }
}

/// Last non-empty path segment of a profile URL, query and fragment stripped.
pub fn profile_slug(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .map(str::to_string)
}

/// Best-scoring entry: 0.8 × text overlap plus ±0.2 for start-date agreement.
pub fn best_match<'a>(claim: &Claim, entries: &'a [ProfileEntry]) -> Option<(&'a ProfileEntry, f64)> {
    entries
        .iter()
        .map(|entry| {
            let text = format!("{} {}", entry.title, entry.organization);
            let overlap = token_overlap(&claim.text, &text);
            let dates = date_agreement(claim.dates.as_ref(), entry);
            (entry, (overlap * 0.8 + dates).clamp(0.0, 1.0))
        })
        .fold(None, |best: Option<(&ProfileEntry, f64)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
}

fn date_agreement(claimed: Option<&DateRange>, entry: &ProfileEntry) -> f64 {
    match (claimed, entry.start) {
        (Some(range), Some(start)) => {
            if (range.start - start).num_days().abs() <= DATE_TOLERANCE_DAYS {
                0.2
            } else {
                -0.2
            }
        }
        _ => 0.0,
    }
}
