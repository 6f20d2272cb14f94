use std::collections::HashSet;
use std::sync::LazyLock;

use futures::future::{BoxFuture, join_all};
use prospect_core::classify::select_email;
use prospect_core::config::SocialBatchConfig;
use prospect_core::error::AppError;
use prospect_core::extract::find_emails;
use prospect_core::models::{LeadSource, Platform, RawLead};
use prospect_core::traits::{Fetcher, SearchQuery, SourceWorker};
use regex::Regex;
use scraper::{Html, Selector};

use super::{DEFAULT_SOURCE_TIMEOUT, fetch_source_page, segment_url};

/// Handles fetched per requested lead, since most bios carry no address.
const HANDLES_PER_LEAD: usize = 3;

/// First path segments that are site sections, not profiles.
const RESERVED_PATHS: &[&str] = &[
    "explore", "p", "reel", "reels", "tv", "stories", "accounts", "about", "legal", "direct",
    "developer", "privacy", "terms", "press", "api", "static", "challenge", "emails", "session",
    "web", "directory", "topics",
];

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""username"\s*:\s*"([A-Za-z0-9._]{1,30})""#).expect("valid regex")
});
static PROFILE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?instagram\.com)?/([A-Za-z0-9._]{1,30})/?$")
        .expect("valid regex")
});
static BIOGRAPHY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""biography"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});
static FULL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""full_name"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[property='og:description'], meta[name='description']")
        .expect("valid selector")
});
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property='og:title']").expect("valid selector"));

static ROLES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("co-?founder", "Co-Founder"),
        ("founder", "Founder"),
        ("ceo", "CEO"),
        ("cto", "CTO"),
        ("coo", "COO"),
        ("cmo", "CMO"),
        ("owner", "Owner"),
        ("president", "President"),
        ("director", "Director"),
        ("partner", "Partner"),
        ("manager", "Manager"),
        ("consultant", "Consultant"),
        ("coach", "Coach"),
    ]
    .into_iter()
    .map(|(keyword, role)| {
        let regex = Regex::new(&format!(r"(?i)\b{keyword}\b")).expect("valid role regex");
        (regex, role)
    })
    .collect()
});

/// Role for a bio by keyword lookup, `"Professional"` when nothing matches.
pub fn infer_role(bio: &str) -> &'static str {
    ROLES
        .iter()
        .find(|(regex, _)| regex.is_match(bio))
        .map_or("Professional", |(_, role)| *role)
}

/// Social bio search in two stages: a tag page yields candidate handles,
/// then profiles are fetched in paced batches and only bios carrying an
/// email become leads.
#[derive(Clone)]
pub struct SocialBioWorker<F: Fetcher> {
    fetcher: F,
    tag_endpoint: String,
    profile_endpoint: String,
    batch: SocialBatchConfig,
}

impl<F: Fetcher> SocialBioWorker<F> {
    pub fn new(
        fetcher: F,
        tag_endpoint: &str,
        profile_endpoint: &str,
        batch: SocialBatchConfig,
    ) -> Self {
        Self {
            fetcher,
            tag_endpoint: tag_endpoint.to_string(),
            profile_endpoint: profile_endpoint.to_string(),
            batch,
        }
    }

    async fn run(&self, query: &SearchQuery) -> Result<Vec<RawLead>, AppError> {
        let tag: String = query
            .niche
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        if tag.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let url = segment_url(&self.tag_endpoint, &tag)?;
        let page = fetch_source_page(&self.fetcher, &url, LeadSource::SocialBio.as_str()).await?;
        let handles = collect_handles(&page.body, query.limit);
        tracing::debug!(source = %LeadSource::SocialBio, tag = %tag, handles = handles.len(), "Collected handles");

        Ok(self.batched_enrich_handles(&handles, query.limit).await)
    }

    /// Fetch profiles `batch_size` at a time, pausing between batches, until
    /// `limit` leads are collected or the handles run out.
    pub async fn batched_enrich_handles(&self, handles: &[String], limit: usize) -> Vec<RawLead> {
        let mut leads = Vec::new();
        for (index, batch) in handles.chunks(self.batch.batch_size.max(1)).enumerate() {
            if leads.len() >= limit {
                break;
            }
            if index > 0 && !self.batch.delay.is_zero() {
                tokio::time::sleep(self.batch.delay).await;
            }
            let profiles = join_all(batch.iter().map(|handle| self.fetch_profile(handle))).await;
            leads.extend(profiles.into_iter().flatten());
        }
        leads.truncate(limit);
        leads
    }

    async fn fetch_profile(&self, handle: &str) -> Option<RawLead> {
        let url = match segment_url(&self.profile_endpoint, handle) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(handle, error = %e, "Skipping handle");
                return None;
            }
        };
        match self.fetcher.fetch(url.as_str(), DEFAULT_SOURCE_TIMEOUT).await {
            Ok(page) if page.is_success() => parse_profile(handle, &page.body, url.as_str()),
            Ok(page) => {
                tracing::debug!(handle, status = page.status, "Profile unavailable");
                None
            }
            Err(e) => {
                tracing::debug!(handle, error = %e, "Profile fetch failed");
                None
            }
        }
    }
}

impl<F: Fetcher> SourceWorker for SocialBioWorker<F> {
    fn source(&self) -> LeadSource {
        LeadSource::SocialBio
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<RawLead>, AppError>> {
        Box::pin(self.run(query))
    }
}

/// Distinct profile handles on a tag page, at most `3 × limit`.
pub fn collect_handles(body: &str, limit: usize) -> Vec<String> {
    let cap = limit.saturating_mul(HANDLES_PER_LEAD);
    let doc = Html::parse_document(body);

    let from_links = doc.select(&ANCHOR).filter_map(|a| {
        let href = a.value().attr("href")?.trim();
        PROFILE_HREF_RE.captures(href).map(|c| c[1].to_string())
    });
    let from_data = USERNAME_RE.captures_iter(body).map(|c| c[1].to_string());

    let mut seen = HashSet::new();
    from_links
        .chain(from_data)
        .filter(|handle| !RESERVED_PATHS.contains(&handle.to_lowercase().as_str()))
        .filter(|handle| seen.insert(handle.to_lowercase()))
        .take(cap)
        .collect()
}

/// A lead from a profile page, or `None` when the bio has no email.
pub fn parse_profile(handle: &str, body: &str, profile_url: &str) -> Option<RawLead> {
    let doc = Html::parse_document(body);

    let bio = json_string(&BIOGRAPHY_RE, body)
        .filter(|bio| !bio.trim().is_empty())
        .or_else(|| meta_content(&doc, &DESCRIPTION))?;

    let emails = find_emails(&bio);
    let email = select_email(emails.iter())
        .email
        .or_else(|| emails.first().cloned())?;

    let name = json_string(&FULL_NAME_RE, body)
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            meta_content(&doc, &TITLE)
                .and_then(|title| title.split(" (@").next().map(str::to_string))
        })
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| handle.to_string());

    Some(
        RawLead::new(&name, profile_url, &bio, LeadSource::SocialBio)?
            .with_email(email)
            .with_role(infer_role(&bio))
            .with_profile(Platform::Instagram, profile_url),
    )
}

/// First capture of `regex`, decoded as a JSON string literal.
fn json_string(regex: &Regex, body: &str) -> Option<String> {
    let raw = regex.captures(body)?.get(1)?.as_str();
    serde_json::from_str(&format!("\"{raw}\"")).ok()
}

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}
