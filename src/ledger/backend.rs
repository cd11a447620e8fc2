use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{AnchorMetadata, RegisterEntry};

use super::auth::{AuthError, LedgerAuth};

#[derive(Debug, Error)]
pub enum LedgerBackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request signing failed: {0}")]
    Auth(#[from] AuthError),

    #[error("register rejected submission: {0}")]
    Rejected(String),
}

/// An append-only register reachable through submit and lookup only.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    fn backend_id(&self) -> &str;

    /// Record `content_hash` with its metadata and return the register's id.
    async fn submit(
        &self,
        content_hash: &str,
        metadata: &AnchorMetadata,
    ) -> Result<String, LedgerBackendError>;

    async fn lookup(&self, content_hash: &str) -> Result<Option<RegisterEntry>, LedgerBackendError>;
}

// ---------------------------------------------------------------------------
// In-memory register
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Register {
    entries: Vec<RegisterEntry>,
    by_hash: HashMap<String, usize>,
}

/// Process-local register. Entries are never modified or removed.
#[derive(Default)]
pub struct InMemoryLedger {
    register: Mutex<Register>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.register.lock().await.entries.len()
    }

    pub async fn entries(&self) -> Vec<RegisterEntry> {
        self.register.lock().await.entries.clone()
    }
}

#[async_trait]
impl LedgerBackend for InMemoryLedger {
    fn backend_id(&self) -> &str {
        "in-memory"
    }

    async fn submit(
        &self,
        content_hash: &str,
        metadata: &AnchorMetadata,
    ) -> Result<String, LedgerBackendError> {
        let mut register = self.register.lock().await;
        if let Some(&i) = register.by_hash.get(content_hash) {
            return Ok(register.entries[i].record_id.clone());
        }

        let record_id = format!("mem-{:06}", register.entries.len() + 1);
        register.entries.push(RegisterEntry {
            record_id: record_id.clone(),
            content_hash: content_hash.to_string(),
            metadata: metadata.clone(),
            recorded_at: Utc::now(),
        });
        let index = register.entries.len() - 1;
        register.by_hash.insert(content_hash.to_string(), index);
        Ok(record_id)
    }

    async fn lookup(&self, content_hash: &str) -> Result<Option<RegisterEntry>, LedgerBackendError> {
        let register = self.register.lock().await;
        Ok(register
            .by_hash
            .get(content_hash)
            .map(|&i| register.entries[i].clone()))
    }
}

// ---------------------------------------------------------------------------
// HTTP register
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    content_hash: &'a str,
    metadata: &'a AnchorMetadata,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    record_id: String,
}

/// JSON register service. Writes are HMAC-signed when credentials are set.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    http: Client,
    base_url: String,
    auth: Option<LedgerAuth>,
}

impl HttpLedger {
    pub fn new(http: Client, base_url: &str, auth: Option<LedgerAuth>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }
}

#[async_trait]
impl LedgerBackend for HttpLedger {
    fn backend_id(&self) -> &str {
        &self.base_url
    }

    async fn submit(
        &self,
        content_hash: &str,
        metadata: &AnchorMetadata,
    ) -> Result<String, LedgerBackendError> {
        let path = "/records";
        let body = serde_json::to_string(&SubmitRequest {
            content_hash,
            metadata,
        })
        .map_err(|e| LedgerBackendError::Rejected(e.to_string()))?;

        let mut request = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(auth) = &self.auth {
            for (name, value) in auth.headers("POST", path, &body)? {
                request = request.header(name, value);
            }
        }

        let resp = request.body(body).send().await?;
        let status = resp.status();
        if status.is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LedgerBackendError::Rejected(format!("{status}: {text}")));
        }
        let created: SubmitResponse = resp.error_for_status()?.json().await?;
        Ok(created.record_id)
    }

    async fn lookup(&self, content_hash: &str) -> Result<Option<RegisterEntry>, LedgerBackendError> {
        let url = format!("{}/records/{}", self.base_url, content_hash);
        let resp = self.http.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let entry: RegisterEntry = resp.error_for_status()?.json().await?;
        Ok(Some(entry))
    }
}
