use std::time::Duration;

use moka::future::Cache;
use prospect_core::error::AppError;
use prospect_core::models::{RiskLevel, Verification, VerificationStatus};
use prospect_core::traits::{EmailVerifier, NullVerifier};
use reqwest::Client;
use serde_json::Value;
use url::Url;

const DEFAULT_VERIFIER_TIMEOUT: Duration = Duration::from_secs(10);

/// Email verification over HTTP: `GET {base}/verify?email=...`.
///
/// Response mapping is lenient since providers disagree on field names:
/// status comes from `status` or `result`, risk from `risk` or a numeric
/// `score` (0-100, higher is safer).
#[derive(Clone)]
pub struct HttpEmailVerifier {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpEmailVerifier {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(DEFAULT_VERIFIER_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string).filter(|k| !k.is_empty()),
            timeout_secs: DEFAULT_VERIFIER_TIMEOUT.as_secs(),
        })
    }
}

impl EmailVerifier for HttpEmailVerifier {
    async fn verify(&self, email: &str) -> Result<Verification, AppError> {
        let mut url = Url::parse(&format!("{}/verify", self.base_url))
            .map_err(|e| AppError::ConfigError(format!("Invalid verifier URL: {e}")))?;
        url.query_pairs_mut().append_pair("email", email);

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::VerifierError(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(AppError::VerifierError(format!(
                "HTTP {} verifying {email}",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::VerifierError(format!("Unreadable verifier response: {e}")))?;
        Ok(parse_verification(&body))
    }
}

fn parse_verification(body: &Value) -> Verification {
    let status = body
        .get("status")
        .or_else(|| body.get("result"))
        .and_then(Value::as_str)
        .map(|s| match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "valid" | "deliverable" | "ok" => VerificationStatus::Valid,
            "invalid" | "undeliverable" | "bounce" => VerificationStatus::Invalid,
            "catch_all" | "catchall" | "accept_all" => VerificationStatus::CatchAll,
            _ => VerificationStatus::Unknown,
        })
        .unwrap_or_default();

    let risk = match body.get("risk") {
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Unknown,
        },
        _ => match body.get("score").and_then(Value::as_f64) {
            Some(score) if score >= 80.0 => RiskLevel::Low,
            Some(score) if score >= 50.0 => RiskLevel::Medium,
            Some(_) => RiskLevel::High,
            None => RiskLevel::Unknown,
        },
    };

    Verification { status, risk }
}

/// Memoizes another verifier per lowercase address for the life of a run.
#[derive(Clone)]
pub struct CachingVerifier<V: EmailVerifier> {
    inner: V,
    cache: Cache<String, Verification>,
}

impl<V: EmailVerifier> CachingVerifier<V> {
    pub fn new(inner: V, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity),
        }
    }
}

impl<V: EmailVerifier + 'static> EmailVerifier for CachingVerifier<V> {
    async fn verify(&self, email: &str) -> Result<Verification, AppError> {
        let key = email.trim().to_lowercase();
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }
        let verdict = self.inner.verify(&key).await?;
        self.cache.insert(key, verdict).await;
        Ok(verdict)
    }
}

/// The verifier chosen at configuration time.
#[derive(Clone)]
pub enum LeadVerifier {
    Http(CachingVerifier<HttpEmailVerifier>),
    Disabled(NullVerifier),
}

impl LeadVerifier {
    /// HTTP verification when a base URL is configured, else none.
    pub fn from_options(base_url: Option<&str>, api_key: Option<&str>) -> Result<Self, AppError> {
        match base_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Ok(Self::Http(CachingVerifier::new(
                HttpEmailVerifier::new(url, api_key)?,
                10_000,
            ))),
            None => Ok(Self::Disabled(NullVerifier)),
        }
    }
}

impl EmailVerifier for LeadVerifier {
    async fn verify(&self, email: &str) -> Result<Verification, AppError> {
        match self {
            LeadVerifier::Http(verifier) => verifier.verify(email).await,
            LeadVerifier::Disabled(verifier) => verifier.verify(email).await,
        }
    }
}
