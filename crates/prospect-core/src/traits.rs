use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::models::{LeadSource, QualityAssessment, RawLead, Verification};

/// A fetched response. Any status is returned; callers decide what to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches a page body, drawing a fresh request identity per call.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchedPage, AppError>> + Send;
}

/// Converts raw HTML into clean readable text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Parameters handed to every source worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub niche: String,
    pub location: String,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(niche: impl Into<String>, location: impl Into<String>, limit: usize) -> Self {
        Self {
            niche: niche.into(),
            location: location.into(),
            limit,
        }
    }

    /// `niche` and `location` joined for free-text search boxes.
    pub fn terms(&self) -> String {
        if self.location.trim().is_empty() {
            self.niche.trim().to_string()
        } else {
            format!("{} {}", self.niche.trim(), self.location.trim())
        }
    }
}

/// One public source of raw candidates.
///
/// Boxed so the discovery fan-out can hold heterogeneous workers. An empty
/// vector is a valid outcome, not an error.
pub trait SourceWorker: Send + Sync {
    fn source(&self) -> LeadSource;

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<RawLead>, AppError>>;
}

/// Checks deliverability signals for an address.
pub trait EmailVerifier: Send + Sync + Clone {
    fn verify(&self, email: &str) -> impl Future<Output = Result<Verification, AppError>> + Send;
}

/// Rates a lead from its name, a page excerpt and its canonical email.
pub trait QualityScorer: Send + Sync + Clone {
    fn assess(
        &self,
        name: &str,
        excerpt: &str,
        email: Option<&str>,
    ) -> impl Future<Output = Result<QualityAssessment, AppError>> + Send;
}

/// A no-op verifier for when no verification service is configured.
#[derive(Debug, Clone, Default)]
pub struct NullVerifier;

impl EmailVerifier for NullVerifier {
    async fn verify(&self, _email: &str) -> Result<Verification, AppError> {
        Ok(Verification::unknown())
    }
}
