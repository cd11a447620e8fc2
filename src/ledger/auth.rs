use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL_SAFE},
    Engine,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-API-KEY";
pub const TIMESTAMP_HEADER: &str = "X-TIMESTAMP";
pub const SIGNATURE_HEADER: &str = "X-SIGNATURE";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid base64 secret: {0}")]
    InvalidSecret(#[from] base64::DecodeError),

    #[error("HMAC computation failed: {0}")]
    HmacError(String),
}

/// Credentials for the register's write API.
#[derive(Clone)]
pub struct LedgerAuth {
    pub api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for LedgerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerAuth")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl LedgerAuth {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self { api_key, api_secret }
    }

    /// HMAC-SHA256 over `{timestamp}{method}{path}{body}`, base64 encoded.
    /// The secret is base64 (URL-safe or standard) and decoded before use.
    pub fn sign(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<String, AuthError> {
        let secret_bytes = BASE64_URL_SAFE
            .decode(&self.api_secret)
            .or_else(|_| BASE64.decode(&self.api_secret))?;

        let mut mac = HmacSha256::new_from_slice(&secret_bytes)
            .map_err(|e| AuthError::HmacError(e.to_string()))?;
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Header triples for one signed request.
    pub fn headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<[(&'static str, String); 3], AuthError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&timestamp, method, path, body)?;
        Ok([
            (API_KEY_HEADER, self.api_key.clone()),
            (TIMESTAMP_HEADER, timestamp),
            (SIGNATURE_HEADER, signature),
        ])
    }
}
