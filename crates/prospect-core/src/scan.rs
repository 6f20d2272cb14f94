use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::discovery::DiscoveryService;
use crate::enrich::EnrichmentService;
use crate::error::AppError;
use crate::models::EnrichedLead;
use crate::progress::ProgressReporter;
use crate::traits::{Cleaner, EmailVerifier, Fetcher, QualityScorer};

/// A validated scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanQuery {
    pub niche: String,
    pub location: String,
    pub limit: usize,
}

impl ScanQuery {
    /// Split a free-text query into niche and location.
    ///
    /// `"dental clinics in Austin, TX"` and `"dental clinics | Austin, TX"`
    /// both yield niche `dental clinics` and location `Austin, TX`. The split
    /// happens on the last ` in `, so niches containing the word survive.
    pub fn parse(query: &str, limit: usize) -> Result<Self, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidQuery("query must not be empty".into()));
        }
        if limit == 0 {
            return Err(AppError::InvalidQuery("limit must be at least 1".into()));
        }

        let (niche, location) = if let Some((niche, location)) = query.split_once('|') {
            (niche, location)
        } else if let Some(idx) = query.to_ascii_lowercase().rfind(" in ") {
            (&query[..idx], &query[idx + " in ".len()..])
        } else {
            (query, "")
        };

        let niche = niche.trim();
        if niche.is_empty() {
            return Err(AppError::InvalidQuery(format!(
                "no niche in query '{query}'"
            )));
        }

        Ok(Self {
            niche: niche.to_string(),
            location: location.trim().to_string(),
            limit,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Wall-clock budget for a whole scan. Leads still unenriched when it
    /// runs out are returned in ghost form. `None` waits for every lead.
    pub deadline: Option<Duration>,
}

/// Discovery followed by enrichment, for one query at a time.
pub struct LeadPipeline<F, C, V, Q>
where
    F: Fetcher,
    C: Cleaner,
    V: EmailVerifier,
    Q: QualityScorer,
{
    discovery: DiscoveryService,
    enrichment: EnrichmentService<F, C, V, Q>,
    options: ScanOptions,
}

impl<F, C, V, Q> LeadPipeline<F, C, V, Q>
where
    F: Fetcher,
    C: Cleaner,
    V: EmailVerifier,
    Q: QualityScorer,
{
    pub fn new(
        discovery: DiscoveryService,
        enrichment: EnrichmentService<F, C, V, Q>,
        options: ScanOptions,
    ) -> Self {
        Self {
            discovery,
            enrichment,
            options,
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Run a scan to completion on the current task.
    pub async fn run(
        &self,
        query: &ScanQuery,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Vec<EnrichedLead> {
        let started = Instant::now();
        let deadline = self.options.deadline.map(|budget| started + budget);

        reporter.info(&format!(
            "Scanning for \"{}\"{} (limit {})",
            query.niche,
            if query.location.is_empty() {
                String::new()
            } else {
                format!(" in {}", query.location)
            },
            query.limit
        ));

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => Vec::new(),
            raw = self.discovery.discover(&query.niche, &query.location, query.limit, reporter) => raw,
        };
        if raw.is_empty() {
            if cancel.is_cancelled() {
                reporter.warning("Scan cancelled during discovery");
            }
            return Vec::new();
        }

        let leads = self
            .enrichment
            .enrich_all_until(raw, reporter, deadline, cancel)
            .await;

        let with_email = leads.iter().filter(|l| l.email.is_some()).count();
        tracing::info!(
            leads = leads.len(),
            with_email,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );
        reporter.success(&format!(
            "Scan complete: {} leads, {with_email} with email",
            leads.len()
        ));
        leads
    }
}

impl<F, C, V, Q> LeadPipeline<F, C, V, Q>
where
    F: Fetcher + 'static,
    C: Cleaner + 'static,
    V: EmailVerifier + 'static,
    Q: QualityScorer + 'static,
{
    /// Validate `query` and start the scan in the background.
    ///
    /// Invalid queries fail here, before any work starts. Everything after
    /// that degrades instead of failing.
    pub fn scan(
        self: Arc<Self>,
        query: &str,
        limit: usize,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<ScanHandle, AppError> {
        let query = ScanQuery::parse(query, limit)?;
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let span = tracing::info_span!("scan", %id, niche = %query.niche);
        let task_query = query.clone();

        let join = tokio::spawn(
            async move { self.run(&task_query, reporter.as_ref(), &token).await }.instrument(span),
        );

        Ok(ScanHandle {
            id,
            query,
            cancel,
            join,
        })
    }
}

/// A running scan.
#[derive(Debug)]
pub struct ScanHandle {
    id: Uuid,
    query: ScanQuery,
    cancel: CancellationToken,
    join: JoinHandle<Vec<EnrichedLead>>,
}

impl ScanHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &ScanQuery {
        &self.query
    }

    /// Ask the scan to stop. Leads gathered so far are still returned by
    /// [`wait`](Self::wait).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this scan, for signal handlers and other tasks
    /// that can't hold the handle itself.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Result<Vec<EnrichedLead>, AppError> {
        self.join
            .await
            .map_err(|e| AppError::Generic(format!("Scan {} failed: {e}", self.id)))
    }
}
