use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

use crate::config::AppConfig;
use crate::models::{Claim, ClaimType, SourceResult};
use crate::sources::{
    http_client, CertificateSource, CodeHostingSource, ProfessionalNetworkSource,
    SkillAssessmentSource, SourceKind, TimelineSource, VerificationSource,
};

/// Default number of in-flight calls allowed per source.
pub const DEFAULT_RATE_LIMIT: usize = 8;

/// A source plus the rate limiter shared by every claim that calls it.
#[derive(Clone)]
pub struct RegisteredSource {
    source: Arc<dyn VerificationSource>,
    limiter: Arc<Semaphore>,
}

impl RegisteredSource {
    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn supports(&self, claim_type: ClaimType) -> bool {
        self.source.supports(claim_type)
    }

    /// Permits currently free on this source's limiter.
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// One attempt: wait for a rate-limit permit, then call the source. Both
    /// waits end at `deadline`.
    pub async fn call(&self, claim: &Claim, deadline: Instant) -> SourceResult {
        let kind = self.kind();
        let started = Instant::now();

        let _permit = match timeout_at(deadline, self.limiter.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return SourceResult::error(kind, &claim.id, "rate limiter closed")
                    .with_latency(started.elapsed());
            }
            Err(_) => {
                tracing::debug!(source = %kind, claim_id = %claim.id, "Deadline hit waiting for rate limit");
                return SourceResult::timeout(kind, &claim.id).with_latency(started.elapsed());
            }
        };

        match timeout_at(deadline, self.source.verify(claim, deadline)).await {
            Ok(result) => result,
            Err(_) => SourceResult::timeout(kind, &claim.id).with_latency(started.elapsed()),
        }
    }
}

/// The fixed set of verification sources, at most one per [`SourceKind`],
/// kept in slot order.
#[derive(Clone)]
pub struct SourceRegistry {
    entries: Vec<RegisteredSource>,
    rate_limit: usize,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT)
    }
}

impl SourceRegistry {
    pub fn new(rate_limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            rate_limit: rate_limit.max(1),
        }
    }

    /// Build the registry the binary runs with. Network sources without a
    /// configured endpoint are left out.
    pub fn from_config(config: &AppConfig) -> Self {
        let http = http_client(config.per_source_timeout());
        let mut registry = Self::new(config.source_rate_limit);

        registry.register(Arc::new(CodeHostingSource::with_base_url(
            http.clone(),
            &config.github_api_url,
            config.github_token.clone(),
        )));
        if let Some(url) = &config.profile_api_url {
            registry.register(Arc::new(ProfessionalNetworkSource::new(http.clone(), url)));
        }
        if let Some(url) = &config.credential_registry_url {
            registry.register(Arc::new(CertificateSource::new(http.clone(), url)));
        }
        registry.register(Arc::new(TimelineSource::new()));
        registry.register(Arc::new(SkillAssessmentSource::default()));

        tracing::info!(
            sources = ?registry.kinds(),
            rate_limit = registry.rate_limit,
            "Verification sources registered"
        );
        registry
    }

    pub fn register(&mut self, source: Arc<dyn VerificationSource>) -> &mut Self {
        let limit = self.rate_limit;
        self.register_with_limit(source, limit)
    }

    /// Register with a dedicated permit count. A second source of the same
    /// kind replaces the first.
    pub fn register_with_limit(
        &mut self,
        source: Arc<dyn VerificationSource>,
        permits: usize,
    ) -> &mut Self {
        let kind = source.kind();
        let entry = RegisteredSource {
            source,
            limiter: Arc::new(Semaphore::new(permits.max(1))),
        };
        match self.entries.iter().position(|e| e.kind() == kind) {
            Some(i) => {
                tracing::warn!(source = %kind, "Replacing registered source");
                self.entries[i] = entry;
            }
            None => {
                self.entries.push(entry);
                self.entries.sort_by_key(|e| e.kind().slot());
            }
        }
        self
    }

    pub fn with_source(mut self, source: Arc<dyn VerificationSource>) -> Self {
        self.register(source);
        self
    }

    /// Sources that apply to `claim_type`, in slot order.
    pub fn applicable(&self, claim_type: ClaimType) -> Vec<&RegisteredSource> {
        self.entries.iter().filter(|e| e.supports(claim_type)).collect()
    }

    pub fn get(&self, kind: SourceKind) -> Option<&RegisteredSource> {
        self.entries.iter().find(|e| e.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.entries.iter().map(RegisteredSource::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
