//! Source search workers: one per public source, each turning a
//! [`SearchQuery`](prospect_core::traits::SearchQuery) into raw leads.
//!
//! The pages these workers parse are whatever the sources currently render,
//! so every parser is best-effort: unknown markup yields fewer leads, never
//! an error.

mod maps;
mod social_bio;
mod video;
mod web_search;

use std::sync::Arc;
use std::time::Duration;

use prospect_core::config::SocialBatchConfig;
use prospect_core::error::AppError;
use prospect_core::traits::{FetchedPage, Fetcher, SourceWorker};
use url::Url;

pub use maps::MapsWorker;
pub use social_bio::{SocialBioWorker, infer_role};
pub use video::VideoWorker;
pub use web_search::{SearchEngine, WebSearchWorker};

/// Per-request timeout for source pages.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

/// Domains that are never a lead's own website: aggregators, directories,
/// social networks and the search engines themselves.
const BLOCKED_DOMAINS: &[&str] = &[
    "yelp.com",
    "yellowpages.com",
    "tripadvisor.com",
    "bbb.org",
    "angi.com",
    "thumbtack.com",
    "houzz.com",
    "mapquest.com",
    "nextdoor.com",
    "healthgrades.com",
    "zocdoc.com",
    "indeed.com",
    "glassdoor.com",
    "wikipedia.org",
    "reddit.com",
    "quora.com",
    "amazon.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "tiktok.com",
    "youtube.com",
    "pinterest.com",
    "google.com",
    "bing.com",
    "duckduckgo.com",
];

/// True if `host` is, or is a subdomain of, a blocked domain.
pub fn is_blocked_domain(host: &str) -> bool {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    BLOCKED_DOMAINS
        .iter()
        .any(|blocked| host == *blocked || host.ends_with(&format!(".{blocked}")))
}

/// Strip a trailing site-name suffix from a result title:
/// `"Smile Dental - Austin Dentist | Yelp"` becomes `"Smile Dental"`.
pub fn clean_title(title: &str) -> String {
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = [" | ", " - ", " – ", " — ", " · ", " :: "]
        .iter()
        .filter_map(|delim| title.find(delim))
        .min();
    match cut {
        Some(idx) if idx > 0 => title[..idx].trim().to_string(),
        _ => title.trim().to_string(),
    }
}

/// Where each source is queried.
///
/// Defaults point at the public sites; [`with_base`](Self::with_base)
/// redirects every source to one host (a mirror, or a mock server in tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEndpoints {
    pub duckduckgo: String,
    pub bing: String,
    pub maps: String,
    pub video: String,
    /// Tag listing prefix; the tag is appended as a path segment.
    pub social_tags: String,
    /// Profile prefix; the handle is appended as a path segment.
    pub social_profiles: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            duckduckgo: "https://html.duckduckgo.com/html/".to_string(),
            bing: "https://www.bing.com/search".to_string(),
            maps: "https://www.google.com/search?tbm=lcl".to_string(),
            video: "https://www.youtube.com/results".to_string(),
            social_tags: "https://www.instagram.com/explore/tags/".to_string(),
            social_profiles: "https://www.instagram.com/".to_string(),
        }
    }
}

impl SourceEndpoints {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            duckduckgo: format!("{base}/duckduckgo/html/"),
            bing: format!("{base}/bing/search"),
            maps: format!("{base}/maps/search"),
            video: format!("{base}/video/results"),
            social_tags: format!("{base}/social/explore/tags/"),
            social_profiles: format!("{base}/social/"),
        }
    }

    /// Host serving a custom endpoint base; `None` for the public defaults.
    pub fn mirror_host(&self) -> Option<String> {
        if *self == Self::default() {
            return None;
        }
        Url::parse(&self.duckduckgo)
            .ok()?
            .host_str()
            .map(str::to_string)
    }

    /// Read `PROSPECT_ENDPOINT_BASE`; unset means the public defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        match lookup("PROSPECT_ENDPOINT_BASE").filter(|v| !v.trim().is_empty()) {
            Some(base) => {
                Url::parse(base.trim()).map_err(|e| {
                    AppError::ConfigError(format!("Invalid PROSPECT_ENDPOINT_BASE '{base}': {e}"))
                })?;
                Ok(Self::with_base(base.trim()))
            }
            None => Ok(Self::default()),
        }
    }
}

/// Build `endpoint` with the given query pairs appended.
pub(crate) fn search_url(endpoint: &str, pairs: &[(&str, &str)]) -> Result<Url, AppError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| AppError::ConfigError(format!("Invalid source endpoint '{endpoint}': {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Append one path segment (a tag or handle) to a prefix endpoint.
pub(crate) fn segment_url(prefix: &str, segment: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(prefix)
        .map_err(|e| AppError::ConfigError(format!("Invalid source endpoint '{prefix}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AppError::ConfigError(format!("Source endpoint cannot take a path: {prefix}")))?
        .pop_if_empty()
        .push(segment)
        .push("");
    Ok(url)
}

/// Fetch a source page, treating error statuses as a failed attempt.
pub(crate) async fn fetch_source_page<F: Fetcher>(
    fetcher: &F,
    url: &Url,
    source: &str,
) -> Result<FetchedPage, AppError> {
    let page = fetcher.fetch(url.as_str(), DEFAULT_SOURCE_TIMEOUT).await?;
    if page.status == 429 {
        return Err(AppError::RateLimitExceeded);
    }
    if !page.is_success() {
        return Err(AppError::HttpError(format!(
            "{source} answered HTTP {}",
            page.status
        )));
    }
    Ok(page)
}

/// Every source worker, in fan-out order.
pub fn build_workers<F: Fetcher + 'static>(
    fetcher: F,
    endpoints: &SourceEndpoints,
    social: &SocialBatchConfig,
) -> Vec<Arc<dyn SourceWorker>> {
    vec![
        Arc::new(WebSearchWorker::new(
            fetcher.clone(),
            SearchEngine::DuckDuckGo,
            &endpoints.duckduckgo,
        )),
        Arc::new(WebSearchWorker::new(
            fetcher.clone(),
            SearchEngine::Bing,
            &endpoints.bing,
        )),
        Arc::new(MapsWorker::new(fetcher.clone(), &endpoints.maps)),
        Arc::new(VideoWorker::new(fetcher.clone(), &endpoints.video)),
        Arc::new(SocialBioWorker::new(
            fetcher,
            &endpoints.social_tags,
            &endpoints.social_profiles,
            social.clone(),
        )),
    ]
}
