pub mod cleaner;
pub mod fetcher;
pub mod llm;
pub mod sources;
pub mod verifier;

pub use cleaner::HtmdCleaner;
pub use fetcher::ReqwestFetcher;
pub use llm::{LeadScorer, OpenAiScorer};
pub use sources::{
    MapsWorker, SearchEngine, SocialBioWorker, SourceEndpoints, VideoWorker, WebSearchWorker,
    build_workers,
};
pub use verifier::{CachingVerifier, HttpEmailVerifier, LeadVerifier};
