use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::models::{Claim, ClaimType, SourceResult};

use super::{token_overlap, within_deadline, SourceError, SourceKind, VerificationSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRecord {
    pub name: String,
    pub issuer: String,
    pub status: CredentialStatus,
}

/// Checks certification claims against an issuer credential registry.
#[derive(Debug, Clone)]
pub struct CertificateSource {
    http: Client,
    base_url: String,
}

impl CertificateSource {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Look up a credential. `Ok(None)` when the registry does not know the id.
    pub async fn get_credential(
        &self,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>, SourceError> {
        let url = format!("{}/credentials/{}", self.base_url, credential_id);
        let resp = self.http.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record: CredentialRecord = resp.error_for_status()?.json().await?;
        Ok(Some(record))
    }

    async fn score(&self, claim: &Claim) -> Result<SourceResult, SourceError> {
        let credential_id = claim
            .context
            .credential_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(SourceError::MissingHandle("credential id"))?;

        let record = self.get_credential(credential_id).await?;
        let (score, confidence) = credential_score(&claim.text, record.as_ref());

        let evidence = match &record {
            Some(r) => json!({
                "credential_id": credential_id,
                "registered": true,
                "name": r.name,
                "issuer": r.issuer,
                "status": format!("{:?}", r.status).to_lowercase(),
            }),
            None => json!({ "credential_id": credential_id, "registered": false }),
        };

        Ok(SourceResult::ok(
            SourceKind::Certificate,
            &claim.id,
            score,
            confidence,
            evidence,
        ))
    }
}

#[async_trait]
impl VerificationSource for CertificateSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Certificate
    }

    fn supports(&self, claim_type: ClaimType) -> bool {
        claim_type == ClaimType::Certification
    }

    async fn verify(&self, claim: &Claim, deadline: Instant) -> SourceResult {
        within_deadline(self.kind(), claim, deadline, self.score(claim)).await
    }
}

/// (score, confidence) for a registry answer.
///
/// - unknown id: 0.1 / 0.7
/// - revoked or expired: 0.0 / 0.95
/// - active: 0.5 + 0.5 × name overlap / 0.95
pub fn credential_score(claim_text: &str, record: Option<&CredentialRecord>) -> (f64, f64) {
    match record {
        None => (0.1, 0.7),
        Some(r) if r.status != CredentialStatus::Active => (0.0, 0.95),
        Some(r) => {
            let overlap = token_overlap(claim_text, &format!("{} {}", r.name, r.issuer));
            (0.5 + 0.5 * overlap, 0.95)
        }
    }
}
