use std::sync::Arc;
use std::time::Duration;

use prospect_core::discovery::DiscoveryService;
use prospect_core::enrich::{EnrichConfig, EnrichmentService};
use prospect_core::models::{LeadSource, RawLead};
use prospect_core::retry::RetryPolicy;
use prospect_core::testutil::{MockCleaner, MockFetcher, MockVerifier, MockWorker, raw_lead};
use prospect_core::traits::{QualityScorer, SourceWorker};

/// `n` distinct leads for `source`, each with its own website.
pub fn leads(source: LeadSource, n: usize) -> Vec<RawLead> {
    let slug = source.as_str().replace('_', "-");
    (0..n)
        .map(|i| {
            raw_lead(
                &format!("{slug} clinic {i}"),
                &format!("https://{slug}-clinic-{i}.com"),
                source,
            )
        })
        .collect()
}

/// One mock worker per source, yielding the given counts in fan-out order.
pub fn workers(counts: [usize; 5]) -> Vec<Arc<dyn SourceWorker>> {
    LeadSource::ALL
        .iter()
        .zip(counts)
        .map(|(source, n)| Arc::new(MockWorker::new(*source, leads(*source, n))) as Arc<dyn SourceWorker>)
        .collect()
}

pub fn discovery(workers: Vec<Arc<dyn SourceWorker>>) -> DiscoveryService {
    DiscoveryService::new(workers, RetryPolicy::new(5, Duration::ZERO))
}

pub fn enrichment<Q: QualityScorer>(
    fetcher: MockFetcher,
    verifier: MockVerifier,
    scorer: Q,
) -> EnrichmentService<MockFetcher, MockCleaner, MockVerifier, Q> {
    EnrichmentService::new(
        fetcher,
        MockCleaner::passthrough(),
        verifier,
        scorer,
        EnrichConfig::default(),
    )
}
