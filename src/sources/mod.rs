//! Verification sources: one external (or local) signal each, behind
//! [`VerificationSource`].
//!
//! The set of sources is closed: every implementation reports one
//! [`SourceKind`], and each kind owns a fixed block of feature slots. Adding a
//! source means adding a variant.

pub mod certificate;
pub mod code_hosting;
pub mod professional_network;
pub mod skill_assessment;
pub mod timeline;

pub use certificate::CertificateSource;
pub use code_hosting::CodeHostingSource;
pub use professional_network::ProfessionalNetworkSource;
pub use skill_assessment::SkillAssessmentSource;
pub use timeline::TimelineSource;

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::models::{Claim, ClaimType, SourceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    CodeHosting,
    ProfessionalNetwork,
    Certificate,
    Timeline,
    SkillAssessment,
}

impl SourceKind {
    /// Feature-slot order. Never reorder: model artifacts depend on it.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::CodeHosting,
        SourceKind::ProfessionalNetwork,
        SourceKind::Certificate,
        SourceKind::Timeline,
        SourceKind::SkillAssessment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CodeHosting => "code_hosting",
            SourceKind::ProfessionalNetwork => "professional_network",
            SourceKind::Certificate => "certificate",
            SourceKind::Timeline => "timeline",
            SourceKind::SkillAssessment => "skill_assessment",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::CodeHosting => "Code-hosting activity",
            SourceKind::ProfessionalNetwork => "Professional-network match",
            SourceKind::Certificate => "Certificate authenticity",
            SourceKind::Timeline => "Timeline consistency",
            SourceKind::SkillAssessment => "Skill assessment",
        }
    }

    pub fn slot(&self) -> usize {
        match self {
            SourceKind::CodeHosting => 0,
            SourceKind::ProfessionalNetwork => 1,
            SourceKind::Certificate => 2,
            SourceKind::Timeline => 3,
            SourceKind::SkillAssessment => 4,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider that scores the plausibility of one claim.
///
/// Implementations must not retry internally and must give up once
/// `deadline` passes, returning a timeout result. Recoverable failures are
/// reported through [`SourceResult::error`], never by panicking.
#[async_trait]
pub trait VerificationSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn supports(&self, claim_type: ClaimType) -> bool;

    async fn verify(&self, claim: &Claim, deadline: Instant) -> SourceResult;
}

/// Source-internal failure. Converted to a status=error result at the
/// source boundary and never propagated further.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("claim has no {0}")]
    MissingHandle(&'static str),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Run `fut` until `deadline`, mapping expiry to a timeout result and errors
/// to an error result.
pub(crate) async fn within_deadline<F>(
    kind: SourceKind,
    claim: &Claim,
    deadline: Instant,
    fut: F,
) -> SourceResult
where
    F: std::future::Future<Output = Result<SourceResult, SourceError>>,
{
    let started = Instant::now();
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(Ok(result)) => result.with_latency(started.elapsed()),
        Ok(Err(e)) => {
            tracing::debug!(
                source = %kind,
                claim_id = %claim.id,
                error = %e,
                "Source returned no signal"
            );
            SourceResult::error(kind, &claim.id, e.to_string()).with_latency(started.elapsed())
        }
        Err(_) => SourceResult::timeout(kind, &claim.id).with_latency(started.elapsed()),
    }
}

/// Shared HTTP client for the network-backed sources.
pub fn http_client(request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .user_agent(concat!("resume-trust/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

const STOPWORDS: &[&str] = &["at", "of", "in", "for", "the", "and", "from", "to", "with"];

/// Lowercased alphanumeric tokens of length >= 2, stopwords removed.
pub(crate) fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Share of the claim's tokens found in `candidate` (0-1).
pub(crate) fn token_overlap(claim_text: &str, candidate: &str) -> f64 {
    let wanted = tokens(claim_text);
    if wanted.is_empty() {
        return 0.0;
    }
    let found = tokens(candidate);
    wanted.intersection(&found).count() as f64 / wanted.len() as f64
}
