use std::collections::HashSet;
use std::sync::LazyLock;

use futures::future::BoxFuture;
use prospect_core::error::AppError;
use prospect_core::models::{LeadSource, RawLead};
use prospect_core::traits::{Fetcher, SearchQuery, SourceWorker};
use regex::Regex;
use scraper::{Html, Selector};

use super::{fetch_source_page, search_url};

static CARD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.VkpGBb, div[role='listitem'], div.business-card, li.business-card")
        .expect("valid selector")
});
static NAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".dbg0pd, .OSrXXb, .business-name, [role='heading'], h3, h2")
        .expect("valid selector")
});
static ADDRESS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".address, [itemprop='address'], address").expect("valid selector")
});

// "4.8(120)", "4.5 stars", opening hours and price tiers are card noise.
static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\d(?:\.\d)?\s*(?:\(|stars?|★)|open\b|closed\b|opens\b|closes\b|\$+\s*$)")
        .expect("valid regex")
});

/// Map listing "business cards": name plus the address line. Listings
/// carry no website; enrichment leaves those leads unfetched.
#[derive(Clone)]
pub struct MapsWorker<F: Fetcher> {
    fetcher: F,
    endpoint: String,
}

impl<F: Fetcher> MapsWorker<F> {
    pub fn new(fetcher: F, endpoint: &str) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.to_string(),
        }
    }

    async fn run(&self, query: &SearchQuery) -> Result<Vec<RawLead>, AppError> {
        let url = search_url(&self.endpoint, &[("q", &query.terms())])?;
        let page = fetch_source_page(&self.fetcher, &url, LeadSource::Maps.as_str()).await?;

        let leads = parse_listings(&page.body, query.limit);
        tracing::debug!(source = %LeadSource::Maps, count = leads.len(), "Parsed map listings");
        Ok(leads)
    }
}

impl<F: Fetcher> SourceWorker for MapsWorker<F> {
    fn source(&self) -> LeadSource {
        LeadSource::Maps
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<RawLead>, AppError>> {
        Box::pin(self.run(query))
    }
}

/// Parse listing cards into at most `limit` leads with an empty website and
/// the address as snippet.
pub fn parse_listings(body: &str, limit: usize) -> Vec<RawLead> {
    let doc = Html::parse_document(body);
    let mut seen = HashSet::new();

    doc.select(&CARD)
        .filter_map(|card| {
            let lines: Vec<String> = card
                .text()
                .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|t| !t.is_empty())
                .collect();

            let name = card
                .select(&NAME)
                .next()
                .map(|n| n.text().collect::<String>())
                .or_else(|| lines.first().cloned())?;
            let name = name.trim().to_string();

            let address = card
                .select(&ADDRESS)
                .next()
                .map(|a| a.text().collect::<Vec<_>>().join(" "))
                .or_else(|| {
                    lines
                        .iter()
                        .filter(|line| **line != name)
                        .find(|line| looks_like_address(line))
                        .cloned()
                })
                .unwrap_or_default();

            if !seen.insert(name.to_lowercase()) {
                return None;
            }
            RawLead::new(&name, "", &address, LeadSource::Maps)
        })
        .take(limit)
        .collect()
}

fn looks_like_address(line: &str) -> bool {
    line.chars().count() > 5
        && line.chars().any(|c| c.is_ascii_digit())
        && line.chars().any(char::is_alphabetic)
        && !NOISE.is_match(line)
}

#[cfg(test)]
mod tests {
    use prospect_core::testutil::MockFetcher;

    use super::*;

    const LISTINGS: &str = r#"<html><body>
        <div class="VkpGBb">
          <div class="dbg0pd"><span>Smile Dental Studio</span></div>
          <div>4.8(120) · Dentist</div>
          <div>1200 Congress Ave, Austin, TX</div>
          <div>Open · Closes 6 PM</div>
        </div>
        <div class="VkpGBb">
          <div class="dbg0pd"><span>Lakeway Orthodontics</span></div>
          <div>Orthodontist</div>
          <div>Closed · Opens 8 AM</div>
        </div>
        <div class="business-card">
          <h3>Corner Bakery</h3>
          <address>55 Main St,
              Round Rock, TX</address>
        </div>
        <div class="VkpGBb">
          <div class="dbg0pd">smile dental studio</div>
          <div>9 Other Rd, Austin, TX</div>
        </div>
    </body></html>"#;

    #[test]
    fn parses_cards_into_website_less_leads() {
        let leads = parse_listings(LISTINGS, 10);
        assert_eq!(leads.len(), 3);

        assert_eq!(leads[0].entity, "Smile Dental Studio");
        assert_eq!(leads[0].snippet, "1200 Congress Ave, Austin, TX");
        assert!(leads[0].website.is_empty());
        assert_eq!(leads[0].source, LeadSource::Maps);

        assert_eq!(leads[1].entity, "Lakeway Orthodontics");
        assert_eq!(leads[1].snippet, "");

        assert_eq!(leads[2].entity, "Corner Bakery");
        assert_eq!(leads[2].snippet, "55 Main St, Round Rock, TX");
    }

    #[test]
    fn address_heuristic_skips_ratings_and_hours() {
        assert!(looks_like_address("1200 Congress Ave, Austin, TX"));
        assert!(!looks_like_address("4.8(120) · Dentist"));
        assert!(!looks_like_address("Closed · Opens 8 AM"));
        assert!(!looks_like_address("Dentist"));
    }

    #[tokio::test]
    async fn search_caps_at_limit() {
        let worker = MapsWorker::new(MockFetcher::new(LISTINGS), "https://maps.test/search?tbm=lcl");
        let leads = worker
            .search(&SearchQuery::new("dentist", "Austin", 2))
            .await
            .unwrap();
        assert_eq!(leads.len(), 2);
    }
}
