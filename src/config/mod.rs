use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::ledger::AnchorConfig;
use crate::services::pipeline::PipelineConfig;
use crate::verification::OrchestratorConfig;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_MODEL_PATH: &str = "models/claim-trust-v1.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// In-memory storage when unset.
    pub database_url: Option<String>,
    pub model_path: String,

    // Verification sources (network sources are skipped without a URL)
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub profile_api_url: Option<String>,
    pub credential_registry_url: Option<String>,

    // Register (in-memory when LEDGER_URL is unset)
    pub ledger_url: Option<String>,
    pub ledger_api_key: Option<String>,
    pub ledger_api_secret: Option<String>,

    // Orchestration
    pub per_source_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_source_concurrency: usize,
    pub claim_deadline_ms: u64,
    pub max_concurrent_claims: usize,
    pub resume_deadline_ms: u64,
    pub source_rate_limit: usize,

    pub explain_top_k: usize,
    pub anchor_max_attempts: u32,
    pub anchor_backoff_ms: u64,

    pub log_json: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: optional("DATABASE_URL"),
            model_path: env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.into()),

            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.into()),
            github_token: optional("GITHUB_TOKEN"),
            profile_api_url: optional("PROFILE_API_URL"),
            credential_registry_url: optional("CREDENTIAL_REGISTRY_URL"),

            ledger_url: optional("LEDGER_URL"),
            ledger_api_key: optional("LEDGER_API_KEY"),
            ledger_api_secret: optional("LEDGER_API_SECRET"),

            per_source_timeout_ms: parsed("PER_SOURCE_TIMEOUT_MS", 5_000)?,
            max_retries: parsed("MAX_RETRIES", 2)?,
            retry_backoff_ms: parsed("RETRY_BACKOFF_MS", 100)?,
            max_source_concurrency: parsed("MAX_SOURCE_CONCURRENCY", 4)?,
            claim_deadline_ms: parsed("CLAIM_DEADLINE_MS", 15_000)?,
            max_concurrent_claims: parsed("MAX_CONCURRENT_CLAIMS", 8)?,
            resume_deadline_ms: parsed("RESUME_DEADLINE_MS", 60_000)?,
            source_rate_limit: parsed("SOURCE_RATE_LIMIT", 8)?,

            explain_top_k: parsed("EXPLAIN_TOP_K", 5)?,
            anchor_max_attempts: parsed("ANCHOR_MAX_ATTEMPTS", 3)?,
            anchor_backoff_ms: parsed("ANCHOR_BACKOFF_MS", 200)?,

            log_json: parsed("LOG_JSON", false)?,
        })
    }

    /// Returns true if both register credentials are configured.
    pub fn has_ledger_auth(&self) -> bool {
        self.ledger_api_key.is_some() && self.ledger_api_secret.is_some()
    }

    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_millis(self.per_source_timeout_ms)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            per_source_timeout: self.per_source_timeout(),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            max_concurrency: self.max_source_concurrency,
            claim_deadline: Duration::from_millis(self.claim_deadline_ms),
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            orchestrator: self.orchestrator(),
            max_concurrent_claims: self.max_concurrent_claims,
            resume_deadline: Duration::from_millis(self.resume_deadline_ms),
            explain_top_k: self.explain_top_k,
        }
    }

    pub fn anchor(&self) -> AnchorConfig {
        AnchorConfig {
            max_attempts: self.anchor_max_attempts,
            backoff: Duration::from_millis(self.anchor_backoff_ms),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Unset falls back to `default`; a set but malformed value is an error.
fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value {raw:?}")),
        None => Ok(default),
    }
}
