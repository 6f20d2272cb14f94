//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::models::{LeadSource, QualityAssessment, RawLead, Verification};
use crate::progress::{ProgressLine, ProgressReporter};
use crate::traits::{
    Cleaner, EmailVerifier, FetchedPage, Fetcher, QualityScorer, SearchQuery, SourceWorker,
};

/// Build a raw lead, panicking on an empty entity.
pub fn raw_lead(entity: &str, website: &str, source: LeadSource) -> RawLead {
    RawLead::new(entity, website, "", source).expect("non-empty test entity")
}

/// A fetched page with the given final URL, status and body.
pub fn page(url: &str, status: u16, body: &str) -> FetchedPage {
    FetchedPage {
        url: url.to_string(),
        status,
        body: body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that serves queued pages, then a fallback body.
#[derive(Clone)]
pub struct MockFetcher {
    /// Each call pops the first element.
    pages: Arc<Mutex<VecDeque<Result<FetchedPage, AppError>>>>,
    /// `(url fragment, body)` pairs consulted before the fallback.
    routes: Arc<Vec<(String, String)>>,
    /// Body served once the queue is empty. `None` makes every further call
    /// fail.
    fallback: Option<String>,
    /// Every `(url, timeout)` requested, in call order.
    pub requested: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl MockFetcher {
    /// Serves `html` for every request.
    pub fn new(html: &str) -> Self {
        Self {
            pages: Arc::new(Mutex::new(VecDeque::new())),
            routes: Arc::new(Vec::new()),
            fallback: Some(html.to_string()),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails the first request with `error` and every later one with a
    /// network error.
    pub fn with_error(error: AppError) -> Self {
        Self {
            pages: Arc::new(Mutex::new(VecDeque::from([Err(error)]))),
            routes: Arc::new(Vec::new()),
            fallback: None,
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_pages(pages: Vec<Result<FetchedPage, AppError>>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages.into())),
            routes: Arc::new(Vec::new()),
            fallback: Some("<html><body>default</body></html>".to_string()),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serves the body of the first route whose fragment occurs in the
    /// requested URL; unmatched URLs get a 404 with an empty body.
    pub fn with_routes(routes: &[(&str, &str)]) -> Self {
        Self {
            pages: Arc::new(Mutex::new(VecDeque::new())),
            routes: Arc::new(
                routes
                    .iter()
                    .map(|(fragment, body)| (fragment.to_string(), body.to_string()))
                    .collect(),
            ),
            fallback: None,
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs requested so far, in call order.
    pub fn urls(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, AppError> {
        self.requested
            .lock()
            .unwrap()
            .push((url.to_string(), timeout));
        if let Some(queued) = self.pages.lock().unwrap().pop_front() {
            return queued;
        }
        if !self.routes.is_empty() {
            return Ok(self
                .routes
                .iter()
                .find(|(fragment, _)| url.contains(fragment.as_str()))
                .map_or_else(|| page(url, 404, ""), |(_, body)| page(url, 200, body)));
        }
        match &self.fallback {
            Some(body) => Ok(page(url, 200, body)),
            None => Err(AppError::NetworkError(format!("connection refused: {url}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that applies a simple transformation.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    /// Creates a cleaner that returns the input unchanged.
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cleaner that fails once.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockWorker
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum WorkerBehavior {
    Always(Vec<RawLead>),
    Queued(Arc<Mutex<VecDeque<Result<Vec<RawLead>, AppError>>>>),
    Panic,
}

/// Mock source worker.
#[derive(Clone)]
pub struct MockWorker {
    source: LeadSource,
    behavior: WorkerBehavior,
    pub calls: Arc<Mutex<u32>>,
    pub queries: Arc<Mutex<Vec<SearchQuery>>>,
}

impl MockWorker {
    fn with_behavior(source: LeadSource, behavior: WorkerBehavior) -> Self {
        Self {
            source,
            behavior,
            calls: Arc::new(Mutex::new(0)),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns `leads` on every call.
    pub fn new(source: LeadSource, leads: Vec<RawLead>) -> Self {
        Self::with_behavior(source, WorkerBehavior::Always(leads))
    }

    /// Always finds nothing.
    pub fn empty(source: LeadSource) -> Self {
        Self::new(source, Vec::new())
    }

    /// Pops one response per call; empty once the queue runs out.
    pub fn with_responses(
        source: LeadSource,
        responses: Vec<Result<Vec<RawLead>, AppError>>,
    ) -> Self {
        Self::with_behavior(
            source,
            WorkerBehavior::Queued(Arc::new(Mutex::new(responses.into()))),
        )
    }

    /// Panics on every call.
    pub fn panicking(source: LeadSource) -> Self {
        Self::with_behavior(source, WorkerBehavior::Panic)
    }
}

impl SourceWorker for MockWorker {
    fn source(&self) -> LeadSource {
        self.source
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<RawLead>, AppError>> {
        Box::pin(async move {
            *self.calls.lock().unwrap() += 1;
            self.queries.lock().unwrap().push(query.clone());
            match &self.behavior {
                WorkerBehavior::Always(leads) => Ok(leads.clone()),
                WorkerBehavior::Queued(queue) => {
                    let next = queue.lock().unwrap().pop_front();
                    next.unwrap_or_else(|| Ok(Vec::new()))
                }
                WorkerBehavior::Panic => panic!("{} worker exploded", self.source),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// MockVerifier
// ---------------------------------------------------------------------------

/// Mock verifier returning a fixed verdict, or failing when it has none.
#[derive(Clone)]
pub struct MockVerifier {
    verdict: Option<Verification>,
    panics: bool,
    pub checked: Arc<Mutex<Vec<String>>>,
}

impl MockVerifier {
    pub fn with_verdict(verdict: Verification) -> Self {
        Self {
            verdict: Some(verdict),
            panics: false,
            checked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unknown() -> Self {
        Self::with_verdict(Verification::unknown())
    }

    pub fn failing() -> Self {
        Self {
            verdict: None,
            panics: false,
            checked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Panics on every call.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::failing()
        }
    }
}

impl EmailVerifier for MockVerifier {
    async fn verify(&self, email: &str) -> Result<Verification, AppError> {
        self.checked.lock().unwrap().push(email.to_string());
        if self.panics {
            panic!("verifier blew up on {email}");
        }
        self.verdict
            .ok_or_else(|| AppError::VerifierError("verifier unavailable".into()))
    }
}

// ---------------------------------------------------------------------------
// MockScorer
// ---------------------------------------------------------------------------

/// Mock scorer returning a fixed assessment, or failing when it has none.
#[derive(Clone)]
pub struct MockScorer {
    assessment: Option<QualityAssessment>,
    /// Entity whose assessment is held back, and for how long.
    delay: Option<(String, Duration)>,
    /// `(name, excerpt, email)` per call.
    pub calls: Arc<Mutex<Vec<(String, String, Option<String>)>>>,
}

impl MockScorer {
    pub fn with_assessment(assessment: QualityAssessment) -> Self {
        Self {
            assessment: Some(assessment),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn neutral() -> Self {
        Self::with_assessment(QualityAssessment::neutral())
    }

    pub fn failing() -> Self {
        Self {
            assessment: None,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep for `delay` before answering for `entity`.
    pub fn with_delay_for(mut self, entity: &str, delay: Duration) -> Self {
        self.delay = Some((entity.to_string(), delay));
        self
    }
}

impl QualityScorer for MockScorer {
    async fn assess(
        &self,
        name: &str,
        excerpt: &str,
        email: Option<&str>,
    ) -> Result<QualityAssessment, AppError> {
        self.calls.lock().unwrap().push((
            name.to_string(),
            excerpt.to_string(),
            email.map(str::to_string),
        ));
        if let Some((entity, delay)) = &self.delay
            && entity == name
        {
            tokio::time::sleep(*delay).await;
        }
        self.assessment.clone().ok_or_else(|| AppError::ScorerError {
            message: "quota exceeded".into(),
            status_code: 429,
            retryable: true,
        })
    }
}

/// Scorer that panics for one entity and is neutral for every other.
#[derive(Clone)]
pub struct PanickingScorer {
    entity: String,
}

impl PanickingScorer {
    pub fn for_entity(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
        }
    }
}

impl QualityScorer for PanickingScorer {
    async fn assess(
        &self,
        name: &str,
        _excerpt: &str,
        _email: Option<&str>,
    ) -> Result<QualityAssessment, AppError> {
        if name == self.entity {
            panic!("scorer blew up on {name}");
        }
        Ok(QualityAssessment::neutral())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Progress sink that keeps every line for assertions.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub lines: Arc<Mutex<Vec<ProgressLine>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.text.clone())
            .collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.texts().iter().filter(|t| t.contains(needle)).count()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, line: ProgressLine) {
        self.lines.lock().unwrap().push(line);
    }
}
