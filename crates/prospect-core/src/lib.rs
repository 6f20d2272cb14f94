pub mod classify;
pub mod config;
pub mod discovery;
pub mod enrich;
pub mod error;
pub mod export;
pub mod extract;
pub mod identity;
pub mod models;
pub mod progress;
pub mod retry;
pub mod scan;
pub mod scoring;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::PipelineConfig;
pub use discovery::DiscoveryService;
pub use enrich::{EnrichConfig, EnrichmentService};
pub use error::AppError;
pub use models::{EnrichedLead, LeadSource, Platform, RawLead, WealthSignal};
pub use progress::{ProgressKind, ProgressLine, ProgressReporter};
pub use scan::{LeadPipeline, ScanHandle, ScanOptions, ScanQuery};
pub use traits::{Cleaner, EmailVerifier, Fetcher, QualityScorer, SourceWorker};
