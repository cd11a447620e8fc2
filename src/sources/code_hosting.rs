use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::models::{Claim, ClaimType, SourceResult};

use super::{tokens, within_deadline, SourceError, SourceKind, VerificationSource};

const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
pub struct GithubProfile {
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub public_gists: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    #[serde(default)]
    pub language: Option<String>,
}

/// Scores skill and project claims against the candidate's public GitHub activity.
#[derive(Debug, Clone)]
pub struct CodeHostingSource {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl CodeHostingSource {
    pub fn new(http: Client, token: Option<String>) -> Self {
        Self::with_base_url(http, GITHUB_API_BASE, token)
    }

    pub fn with_base_url(http: Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Fetch a user profile. `Ok(None)` when the user does not exist.
    pub async fn get_profile(&self, username: &str) -> Result<Option<GithubProfile>, SourceError> {
        let url = format!("{}/users/{}", self.base_url, username);
        let resp = self.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let profile: GithubProfile = resp.error_for_status()?.json().await?;
        Ok(Some(profile))
    }

    /// Fetch up to 100 most recently updated repositories.
    pub async fn get_repositories(&self, username: &str) -> Result<Vec<GithubRepo>, SourceError> {
        let url = format!(
            "{}/users/{}/repos?per_page=100&sort=updated",
            self.base_url, username
        );
        let repos: Vec<GithubRepo> = self.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(repos)
    }

    async fn score(&self, claim: &Claim) -> Result<SourceResult, SourceError> {
        let username = claim
            .context
            .github_username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(SourceError::MissingHandle("github username"))?;

        let Some(profile) = self.get_profile(username).await? else {
            return Ok(SourceResult::ok(
                SourceKind::CodeHosting,
                &claim.id,
                0.0,
                0.6,
                json!({ "username": username, "profile_found": false }),
            ));
        };
        let repos = self.get_repositories(username).await?;

        let activity = activity_score(&profile);
        let recency = recency_score(profile.updated_at, Utc::now());
        let matching = matching_repositories(&claim.text, &repos);
        let language = (matching as f64 / 10.0).min(1.0);
        let score = activity * 0.4 + language * 0.4 + recency * 0.2;
        let confidence = 0.5 + 0.4 * (repos.len() as f64 / 20.0).min(1.0);

        tracing::debug!(
            claim_id = %claim.id,
            username,
            activity,
            recency,
            matching,
            score,
            "Code-hosting activity scored"
        );

        Ok(SourceResult::ok(
            SourceKind::CodeHosting,
            &claim.id,
            score,
            confidence,
            json!({
                "username": username,
                "profile_found": true,
                "repositories": repos.len(),
                "matching_repositories": matching,
                "followers": profile.followers,
                "public_repos": profile.public_repos,
                "last_activity": profile.updated_at,
            }),
        ))
    }
}

#[async_trait]
impl VerificationSource for CodeHostingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CodeHosting
    }

    fn supports(&self, claim_type: ClaimType) -> bool {
        matches!(claim_type, ClaimType::Skill | ClaimType::Project)
    }

    async fn verify(&self, claim: &Claim, deadline: Instant) -> SourceResult {
        within_deadline(self.kind(), claim, deadline, self.score(claim)).await
    }
}

/// Public footprint: repos, followers and gists, capped at 1.
pub fn activity_score(profile: &GithubProfile) -> f64 {
    let repos = (profile.public_repos as f64 / 50.0).min(0.3);
    let followers = (profile.followers as f64 / 100.0).min(0.3);
    let gists = (profile.public_gists as f64 / 50.0).min(0.2);
    (repos + followers + gists).min(1.0)
}

pub fn recency_score(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(updated_at) = updated_at else {
        return 0.0;
    };
    match (now - updated_at).num_days() {
        d if d <= 7 => 1.0,
        d if d <= 30 => 0.8,
        d if d <= 90 => 0.5,
        _ => 0.2,
    }
}

/// Repositories whose primary language is named by the claim.
pub fn matching_repositories(claim_text: &str, repos: &[GithubRepo]) -> usize {
    let claim_lower = claim_text.trim().to_lowercase();
    let claim_tokens = tokens(claim_text);
    repos
        .iter()
        .filter_map(|r| r.language.as_deref())
        .map(str::to_lowercase)
        .filter(|lang| *lang == claim_lower || claim_tokens.contains(lang))
        .count()
}
