use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;

use crate::error::AppError;
use crate::models::{LeadSource, RawLead, dedup_leads};
use crate::progress::ProgressReporter;
use crate::retry::{RetryCause, RetryPolicy, retry_with_backoff};
use crate::traits::{SearchQuery, SourceWorker};

/// Fans a query out to every source worker and merges what comes back.
///
/// Sources are independent: any subset may fail or come back empty without
/// affecting the others. Discovery itself never fails.
pub struct DiscoveryService {
    workers: Vec<Arc<dyn SourceWorker>>,
    retry: RetryPolicy,
}

impl DiscoveryService {
    pub fn new(workers: Vec<Arc<dyn SourceWorker>>, retry: RetryPolicy) -> Self {
        Self { workers, retry }
    }

    pub fn sources(&self) -> Vec<LeadSource> {
        self.workers.iter().map(|w| w.source()).collect()
    }

    /// `limit` split evenly across sources, rounded up.
    pub fn per_source_limit(&self, limit: usize) -> usize {
        limit.div_ceil(self.workers.len().max(1))
    }

    /// Run every source concurrently and return at most `limit` unique leads.
    pub async fn discover(
        &self,
        niche: &str,
        location: &str,
        limit: usize,
        reporter: &dyn ProgressReporter,
    ) -> Vec<RawLead> {
        if self.workers.is_empty() || limit == 0 {
            return Vec::new();
        }

        let query = SearchQuery::new(niche, location, self.per_source_limit(limit));
        tracing::info!(
            terms = %query.terms(),
            sources = self.workers.len(),
            per_source = query.limit,
            "Starting discovery"
        );
        reporter.info(&format!(
            "Searching {} sources for \"{}\"",
            self.workers.len(),
            query.terms()
        ));

        let searches = self
            .workers
            .iter()
            .map(|worker| self.search_source(worker.as_ref(), &query, reporter));
        let merged: Vec<RawLead> = join_all(searches).await.into_iter().flatten().collect();

        let found = merged.len();
        let mut leads = dedup_leads(merged);
        leads.truncate(limit);

        if leads.is_empty() {
            reporter.warning("No leads found on any source");
        } else {
            reporter.success(&format!(
                "Discovered {} unique leads ({} raw hits)",
                leads.len(),
                found
            ));
        }
        leads
    }

    async fn search_source(
        &self,
        worker: &dyn SourceWorker,
        query: &SearchQuery,
        reporter: &dyn ProgressReporter,
    ) -> Vec<RawLead> {
        let source = worker.source();
        let attempts = self.retry.attempts.max(1);

        let leads = retry_with_backoff(
            &self.retry,
            |attempt| async move {
                tracing::debug!(%source, attempt, "Searching source");
                AssertUnwindSafe(worker.search(query))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(AppError::Generic(format!("{source} worker panicked"))))
            },
            |attempt, cause| {
                match cause {
                    RetryCause::Empty => {
                        tracing::info!(%source, attempt, "Source returned nothing");
                    }
                    RetryCause::Failed(err) => {
                        tracing::warn!(%source, attempt, error = %err, "Source search failed");
                    }
                }
                reporter.warning(&format!(
                    "[{source}] fragment missing, retrying with new endpoint ({}/{attempts})",
                    attempt + 1
                ));
            },
        )
        .await;

        if leads.is_empty() {
            tracing::warn!(%source, "Source exhausted retries without results");
            reporter.warning(&format!("[{source}] no results"));
        } else {
            reporter.info(&format!("[{source}] found {} leads", leads.len()));
        }
        leads
    }
}
