use std::collections::HashSet;
use std::sync::LazyLock;

use futures::future::BoxFuture;
use prospect_core::error::AppError;
use prospect_core::models::{LeadSource, RawLead};
use prospect_core::traits::{Fetcher, SearchQuery, SourceWorker};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{clean_title, fetch_source_page, is_blocked_domain, search_url};

static DDG_RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.result:not(.result--ad)").expect("valid selector"));
static DDG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));
static DDG_SNIPPET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("valid selector"));

static BING_RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.b_algo").expect("valid selector"));
static BING_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2 a").expect("valid selector"));
static BING_SNIPPET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".b_caption p, p").expect("valid selector"));

/// The web search engines behind the two search sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEngine {
    DuckDuckGo,
    Bing,
}

impl SearchEngine {
    pub fn source(&self) -> LeadSource {
        match self {
            SearchEngine::DuckDuckGo => LeadSource::GeneralSearch,
            SearchEngine::Bing => LeadSource::SecondarySearch,
        }
    }

    fn selectors(&self) -> (&'static Selector, &'static Selector, &'static Selector) {
        match self {
            SearchEngine::DuckDuckGo => (&*DDG_RESULT, &*DDG_TITLE, &*DDG_SNIPPET),
            SearchEngine::Bing => (&*BING_RESULT, &*BING_TITLE, &*BING_SNIPPET),
        }
    }
}

/// Organic web results: one lead per result whose destination is not an
/// aggregator, directory or social site.
#[derive(Clone)]
pub struct WebSearchWorker<F: Fetcher> {
    fetcher: F,
    engine: SearchEngine,
    endpoint: String,
}

impl<F: Fetcher> WebSearchWorker<F> {
    pub fn new(fetcher: F, engine: SearchEngine, endpoint: &str) -> Self {
        Self {
            fetcher,
            engine,
            endpoint: endpoint.to_string(),
        }
    }

    async fn run(&self, query: &SearchQuery) -> Result<Vec<RawLead>, AppError> {
        let url = search_url(&self.endpoint, &[("q", &query.terms())])?;
        let source = self.engine.source();
        let page = fetch_source_page(&self.fetcher, &url, source.as_str()).await?;

        let leads = parse_results(self.engine, &page.body, query.limit);
        tracing::debug!(source = %source, count = leads.len(), "Parsed search results");
        Ok(leads)
    }
}

impl<F: Fetcher> SourceWorker for WebSearchWorker<F> {
    fn source(&self) -> LeadSource {
        self.engine.source()
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<RawLead>, AppError>> {
        Box::pin(self.run(query))
    }
}

/// Parse a results page into at most `limit` leads, skipping blocked
/// destinations and repeated sites.
pub fn parse_results(engine: SearchEngine, body: &str, limit: usize) -> Vec<RawLead> {
    let doc = Html::parse_document(body);
    let (result_sel, title_sel, snippet_sel) = engine.selectors();
    let mut seen = HashSet::new();

    doc.select(result_sel)
        .filter_map(|block| {
            let anchor = block.select(title_sel).next()?;
            let destination = destination_url(anchor.value().attr("href")?)?;
            let host = destination.host_str()?.to_lowercase();
            if is_blocked_domain(&host) || !seen.insert(host) {
                return None;
            }
            let title = clean_title(&text_of(anchor));
            let snippet = block.select(snippet_sel).next().map(text_of).unwrap_or_default();
            RawLead::new(&title, destination.as_str(), &snippet, engine.source())
        })
        .take(limit)
        .collect()
}

/// Resolve a result href to the destination site, unwrapping DuckDuckGo's
/// `/l/?uddg=` redirect.
fn destination_url(href: &str) -> Option<Url> {
    let href = href.trim();
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    if url.path().starts_with("/l/")
        && let Some((_, target)) = url.query_pairs().find(|(key, _)| key == "uddg")
    {
        return Url::parse(&target)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"));
    }

    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use prospect_core::testutil::MockFetcher;

    use super::*;

    const DDG_PAGE: &str = r#"<html><body>
        <div class="result results_links result--ad">
          <a class="result__a" href="https://ads.example-ads.com/">Sponsored Dental Deals</a>
        </div>
        <div class="result results_links">
          <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fsmile-dental.com%2Fabout&amp;rut=abc">Smile Dental - Austin Family Dentist</a></h2>
          <a class="result__snippet">Gentle   family dentistry in Austin, TX.</a>
        </div>
        <div class="result results_links">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.yelp.com%2Fsearch&amp;rut=def">Best Dentists in Austin | Yelp</a>
        </div>
        <div class="result results_links">
          <a class="result__a" href="https://smile-dental.com/contact">Contact | Smile Dental</a>
        </div>
        <div class="result results_links">
          <a class="result__a" href="https://lakeway-orthodontics.com/">Lakeway Orthodontics | Braces</a>
          <div class="result__snippet">Braces and Invisalign.</div>
        </div>
    </body></html>"#;

    const BING_PAGE: &str = r#"<html><body><ol id="b_results">
        <li class="b_algo"><h2><a href="https://austin-smiles.com/">Austin Smiles · Cosmetic Dentistry</a></h2>
          <div class="b_caption"><p>Veneers and whitening downtown.</p></div></li>
        <li class="b_algo"><h2><a href="https://www.facebook.com/austinsmiles">Austin Smiles | Facebook</a></h2></li>
        <li class="b_ad"><h2><a href="https://ad.example.net/">Ad</a></h2></li>
    </ol></body></html>"#;

    #[test]
    fn parses_duckduckgo_results() {
        let leads = parse_results(SearchEngine::DuckDuckGo, DDG_PAGE, 10);
        assert_eq!(leads.len(), 2);

        assert_eq!(leads[0].entity, "Smile Dental");
        assert_eq!(leads[0].website, "https://smile-dental.com/about");
        assert_eq!(leads[0].snippet, "Gentle family dentistry in Austin, TX.");
        assert_eq!(leads[0].source, LeadSource::GeneralSearch);

        assert_eq!(leads[1].entity, "Lakeway Orthodontics");
    }

    #[test]
    fn parses_bing_results() {
        let leads = parse_results(SearchEngine::Bing, BING_PAGE, 10);
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].entity, "Austin Smiles");
        assert_eq!(leads[0].snippet, "Veneers and whitening downtown.");
        assert_eq!(leads[0].source, LeadSource::SecondarySearch);
    }

    #[test]
    fn respects_limit_and_tolerates_unknown_markup() {
        assert_eq!(parse_results(SearchEngine::DuckDuckGo, DDG_PAGE, 1).len(), 1);
        assert!(parse_results(SearchEngine::Bing, "<html>captcha</html>", 10).is_empty());
        assert!(parse_results(SearchEngine::DuckDuckGo, "", 10).is_empty());
    }

    #[test]
    fn unwraps_redirects_and_rejects_other_schemes() {
        assert_eq!(
            destination_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa-b.com%2F").unwrap().as_str(),
            "https://a-b.com/"
        );
        assert!(destination_url("//duckduckgo.com/l/?uddg=javascript%3Aalert(1)").is_none());
        assert!(destination_url("/relative/path").is_none());
    }

    #[tokio::test]
    async fn search_fetches_encoded_query() {
        let fetcher = MockFetcher::new(DDG_PAGE);
        let worker = WebSearchWorker::new(
            fetcher.clone(),
            SearchEngine::DuckDuckGo,
            "https://html.duckduckgo.com/html/",
        );
        let leads = worker
            .search(&SearchQuery::new("dental clinics", "Austin, TX", 4))
            .await
            .unwrap();

        assert_eq!(leads.len(), 2);
        assert_eq!(
            fetcher.urls(),
            vec!["https://html.duckduckgo.com/html/?q=dental+clinics+Austin%2C+TX"]
        );
    }

    #[tokio::test]
    async fn error_status_is_a_failed_attempt() {
        let fetcher = MockFetcher::with_routes(&[("/elsewhere", "")]);
        let worker = WebSearchWorker::new(fetcher, SearchEngine::Bing, "https://www.bing.com/search");
        let err = worker
            .search(&SearchQuery::new("yoga", "", 3))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
