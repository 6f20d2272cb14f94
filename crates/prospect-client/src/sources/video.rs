use std::collections::HashSet;
use std::sync::LazyLock;

use futures::future::BoxFuture;
use prospect_core::error::AppError;
use prospect_core::models::{LeadSource, Platform, RawLead};
use prospect_core::traits::{Fetcher, SearchQuery, SourceWorker};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use super::{fetch_source_page, search_url};

/// Search filter restricting results to channels.
const CHANNEL_FILTER: &str = "EgIQAg==";

static INITIAL_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)ytInitialData\s*=\s*(\{.*?\})\s*;\s*</script>").expect("valid regex")
});

static CHANNEL_ANCHOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href^='/@'], a[href^='/channel/'], a[href^='/c/']").expect("valid selector")
});

/// Channel search on the video platform. The channel URL is both the lead's
/// website and its `youtube` profile.
#[derive(Clone)]
pub struct VideoWorker<F: Fetcher> {
    fetcher: F,
    endpoint: String,
}

impl<F: Fetcher> VideoWorker<F> {
    pub fn new(fetcher: F, endpoint: &str) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.to_string(),
        }
    }

    async fn run(&self, query: &SearchQuery) -> Result<Vec<RawLead>, AppError> {
        let url = search_url(
            &self.endpoint,
            &[("search_query", &query.terms()), ("sp", CHANNEL_FILTER)],
        )?;
        let page = fetch_source_page(&self.fetcher, &url, LeadSource::Video.as_str()).await?;
        let base = Url::parse(&page.url).unwrap_or(url);

        let leads = parse_channels(&page.body, &base, query.limit);
        tracing::debug!(source = %LeadSource::Video, count = leads.len(), "Parsed channels");
        Ok(leads)
    }
}

impl<F: Fetcher> SourceWorker for VideoWorker<F> {
    fn source(&self) -> LeadSource {
        LeadSource::Video
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<RawLead>, AppError>> {
        Box::pin(self.run(query))
    }
}

struct Channel {
    name: String,
    path: String,
    description: String,
}

/// Parse channel results, preferring the embedded initial-data JSON and
/// falling back to channel links in the markup.
pub fn parse_channels(body: &str, base: &Url, limit: usize) -> Vec<RawLead> {
    let mut channels = channels_from_initial_data(body);
    if channels.is_empty() {
        channels = channels_from_markup(body);
    }

    let mut seen = HashSet::new();
    channels
        .into_iter()
        .filter_map(|channel| {
            let url = base.join(&channel.path).ok()?;
            if !seen.insert(url.as_str().to_lowercase()) {
                return None;
            }
            RawLead::new(&channel.name, url.as_str(), &channel.description, LeadSource::Video)
                .map(|lead| lead.with_profile(Platform::YouTube, url.as_str()))
        })
        .take(limit)
        .collect()
}

fn channels_from_initial_data(body: &str) -> Vec<Channel> {
    let Some(json) = INITIAL_DATA.captures(body).map(|c| c[1].to_string()) else {
        return Vec::new();
    };
    let data: Value = match serde_json::from_str(&json) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable initial data");
            return Vec::new();
        }
    };

    let mut renderers = Vec::new();
    collect_renderers(&data, &mut renderers);
    renderers.into_iter().filter_map(channel_from_renderer).collect()
}

fn collect_renderers<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "channelRenderer" {
                    out.push(child);
                } else {
                    collect_renderers(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_renderers(item, out);
            }
        }
        _ => {}
    }
}

fn channel_from_renderer(renderer: &Value) -> Option<Channel> {
    let name = text_field(&renderer["title"])?;
    let endpoint = &renderer["navigationEndpoint"];
    let path = endpoint["browseEndpoint"]["canonicalBaseUrl"]
        .as_str()
        .or_else(|| endpoint["commandMetadata"]["webCommandMetadata"]["url"].as_str())
        .map(str::to_string)
        .or_else(|| {
            renderer["channelId"]
                .as_str()
                .map(|id| format!("/channel/{id}"))
        })?;
    Some(Channel {
        name,
        path,
        description: text_field(&renderer["descriptionSnippet"]).unwrap_or_default(),
    })
}

/// `{"simpleText": ..}` or `{"runs": [{"text": ..}, ..]}`.
fn text_field(value: &Value) -> Option<String> {
    if let Some(text) = value["simpleText"].as_str() {
        return Some(text.to_string());
    }
    let runs = value["runs"].as_array()?;
    let text: String = runs.iter().filter_map(|run| run["text"].as_str()).collect();
    (!text.trim().is_empty()).then_some(text)
}

fn channels_from_markup(body: &str) -> Vec<Channel> {
    let doc = Html::parse_document(body);
    doc.select(&CHANNEL_ANCHOR)
        .filter_map(|anchor| {
            let path = anchor.value().attr("href")?;
            // Video links under a channel path are not channel results.
            if path.contains("/videos") || path.contains("/shorts") {
                return None;
            }
            let name = anchor.text().collect::<Vec<_>>().join(" ");
            let name = name.trim();
            (!name.is_empty()).then(|| Channel {
                name: name.to_string(),
                path: path.to_string(),
                description: anchor.value().attr("title").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use prospect_core::testutil::MockFetcher;

    use super::*;

    const INITIAL_DATA_PAGE: &str = r#"<html><head></head><body>
        <script>var ytInitialData = {"contents":{"twoColumnSearchResultsRenderer":{"primaryContents":{"sectionListRenderer":{"contents":[{"itemSectionRenderer":{"contents":[
          {"channelRenderer":{"channelId":"UC123","title":{"simpleText":"Austin Dental Tips"},
            "navigationEndpoint":{"browseEndpoint":{"browseId":"UC123","canonicalBaseUrl":"/@austindentaltips"}},
            "descriptionSnippet":{"runs":[{"text":"Weekly tips from "},{"text":"Dr. Jane"}]}}},
          {"videoRenderer":{"videoId":"abc","title":{"runs":[{"text":"Not a channel"}]}}},
          {"channelRenderer":{"channelId":"UC456","title":{"runs":[{"text":"Smile Studio TV"}]}}},
          {"channelRenderer":{"channelId":"UC789","title":{"simpleText":"Austin Dental Tips"},
            "navigationEndpoint":{"browseEndpoint":{"canonicalBaseUrl":"/@AustinDentalTips"}}}}
        ]}}]}}}}};</script>
    </body></html>"#;

    const MARKUP_PAGE: &str = r#"<html><body>
        <ytd-channel-renderer><a id="main-link" href="/@brightsmiles" title="Family dentistry vlog">Bright Smiles</a></ytd-channel-renderer>
        <ytd-channel-renderer><a href="/@brightsmiles/videos">Videos</a></ytd-channel-renderer>
        <ytd-channel-renderer><a href="/channel/UCabc">  </a></ytd-channel-renderer>
    </body></html>"#;

    fn base() -> Url {
        Url::parse("https://www.youtube.com/results?search_query=x").unwrap()
    }

    #[test]
    fn parses_channel_renderers() {
        let leads = parse_channels(INITIAL_DATA_PAGE, &base(), 10);
        assert_eq!(leads.len(), 2);

        assert_eq!(leads[0].entity, "Austin Dental Tips");
        assert_eq!(leads[0].website, "https://www.youtube.com/@austindentaltips");
        assert_eq!(leads[0].snippet, "Weekly tips from Dr. Jane");
        assert_eq!(
            leads[0].social_profiles.get(&Platform::YouTube).map(String::as_str),
            Some("https://www.youtube.com/@austindentaltips")
        );

        assert_eq!(leads[1].entity, "Smile Studio TV");
        assert_eq!(leads[1].website, "https://www.youtube.com/channel/UC456");
    }

    #[test]
    fn falls_back_to_markup() {
        let leads = parse_channels(MARKUP_PAGE, &base(), 10);
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].entity, "Bright Smiles");
        assert_eq!(leads[0].snippet, "Family dentistry vlog");
        assert_eq!(leads[0].website, "https://www.youtube.com/@brightsmiles");
    }

    #[test]
    fn broken_initial_data_falls_back() {
        let body = format!(
            "<script>var ytInitialData = {{not json}};</script>{}",
            MARKUP_PAGE
        );
        assert_eq!(parse_channels(&body, &base(), 10).len(), 1);
    }

    #[tokio::test]
    async fn search_requests_channel_filter() {
        let fetcher = MockFetcher::new(INITIAL_DATA_PAGE);
        let worker = VideoWorker::new(fetcher.clone(), "https://www.youtube.com/results");
        let leads = worker
            .search(&SearchQuery::new("dentist", "Austin", 1))
            .await
            .unwrap();

        assert_eq!(leads.len(), 1);
        assert_eq!(
            fetcher.urls(),
            vec!["https://www.youtube.com/results?search_query=dentist+Austin&sp=EgIQAg%3D%3D"]
        );
    }
}
