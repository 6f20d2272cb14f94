use std::sync::Arc;
use std::time::Duration;

use prospect_client::sources::{SearchEngine, SourceEndpoints, WebSearchWorker};
use prospect_client::{HttpEmailVerifier, OpenAiScorer, ReqwestFetcher};
use prospect_core::error::AppError;
use prospect_core::identity::IdentityPool;
use prospect_core::models::{LeadSource, WealthSignal};
use prospect_core::traits::{EmailVerifier, Fetcher, QualityScorer, SearchQuery, SourceWorker};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new(Arc::new(IdentityPool::builtin()))
        .unwrap()
        .allow_private_urls()
}

#[tokio::test]
async fn sends_identity_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header_exists("user-agent"))
        .and(header_exists("accept-language"))
        .and(header_exists("x-forwarded-for"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = fetcher();
    for _ in 0..2 {
        let page = fetcher.fetch(&server.uri(), TIMEOUT).await.unwrap();
        assert_eq!(page.body, "<p>hello</p>");
    }
}

#[tokio::test]
async fn error_status_still_returns_body() {
    let server = MockServer::start().await;
    Mock::given(path("/broken"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("<p>Call us: owner@clinic.com</p>"),
        )
        .mount(&server)
        .await;

    let page = fetcher()
        .fetch(&format!("{}/broken", server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(page.status, 500);
    assert!(!page.is_success());
    assert!(page.body.contains("owner@clinic.com"));
}

#[tokio::test]
async fn follows_redirects_up_to_the_limit() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;
    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let fetcher = fetcher();
    let page = fetcher
        .fetch(&format!("{}/old", server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert!(page.url.ends_with("/new"));
    assert_eq!(page.body, "moved");

    let err = fetcher
        .fetch(&format!("{}/loop", server.uri()), TIMEOUT)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("redirects"), "{err}");
}

#[tokio::test]
async fn redirect_targets_are_checked_for_private_addresses() {
    let server = MockServer::start().await;
    Mock::given(path("/metadata"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "http://169.254.169.254/latest/meta-data/"),
        )
        .mount(&server)
        .await;
    Mock::given(path("/loopback"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "http://localhost:9/"))
        .mount(&server)
        .await;
    Mock::given(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;

    let guarded = ReqwestFetcher::new(Arc::new(IdentityPool::builtin()))
        .unwrap()
        .allow_host("127.0.0.1");

    let page = guarded
        .fetch(&format!("{}/ok", server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(page.body, "fine");

    for hop in ["/metadata", "/loopback"] {
        let err = guarded
            .fetch(&format!("{}{hop}", server.uri()), TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SSRF blocked"), "{hop}: {err}");
    }
}

#[tokio::test]
async fn slow_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/slow", server.uri()), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)), "{err}");
}

#[tokio::test]
async fn web_search_worker_over_http() {
    let server = MockServer::start().await;
    Mock::given(path("/duckduckgo/html/"))
        .and(query_param("q", "dental clinics Austin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="result"><a class="result__a" href="https://smile-dental.com/">Smile Dental | Home</a>
               <a class="result__snippet">Family dentistry</a></div>"#,
        ))
        .mount(&server)
        .await;

    let endpoints = SourceEndpoints::with_base(&server.uri());
    let worker = WebSearchWorker::new(fetcher(), SearchEngine::DuckDuckGo, &endpoints.duckduckgo);
    let leads = worker
        .search(&SearchQuery::new("dental clinics", "Austin", 5))
        .await
        .unwrap();

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].entity, "Smile Dental");
    assert_eq!(leads[0].source, LeadSource::GeneralSearch);
}

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

#[tokio::test]
async fn openai_scorer_parses_and_clamps() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(
            r#"{"lead_score": 140, "wealth_signal": "high", "estimated_revenue": "$1M+"}"#,
        )))
        .mount(&server)
        .await;

    let scorer = OpenAiScorer::with_base_url("sk-test", "gpt-4o-mini", &server.uri()).unwrap();
    let assessment = scorer
        .assess("Smile Dental", "Boutique dentistry", Some("jane@gmail.com"))
        .await
        .unwrap();

    assert_eq!(assessment.lead_score, 100);
    assert_eq!(assessment.wealth_signal, WealthSignal::High);
    assert_eq!(assessment.estimated_revenue, "$1M+");
}

#[tokio::test]
async fn openai_scorer_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/limited/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(path("/down/chat/completions"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"error": {"message": "overloaded"}})),
        )
        .mount(&server)
        .await;
    Mock::given(path("/garbled/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("not json")))
        .mount(&server)
        .await;

    let scorer = |prefix: &str| {
        OpenAiScorer::with_base_url("sk-test", "gpt-4o-mini", &format!("{}/{prefix}", server.uri()))
            .unwrap()
    };

    let err = scorer("limited").assess("A", "", None).await.unwrap_err();
    assert!(matches!(err, AppError::RateLimitExceeded));

    let err = scorer("down").assess("A", "", None).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::ScorerError { status_code: 503, retryable: true, ref message } if message == "overloaded"
    ));

    let err = scorer("garbled").assess("A", "", None).await.unwrap_err();
    assert!(matches!(err, AppError::ParseError(_)));
}

#[tokio::test]
async fn http_verifier_maps_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/verify"))
        .and(query_param("email", "jane@gmail.com"))
        .and(header("authorization", "Bearer vk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "valid", "risk": "low"})))
        .mount(&server)
        .await;
    Mock::given(path("/verify"))
        .and(query_param("email", "busy@clinic.com"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let verifier = HttpEmailVerifier::new(&server.uri(), Some("vk-test")).unwrap();
    assert!(verifier.verify("jane@gmail.com").await.unwrap().is_valid_low_risk());
    assert!(matches!(
        verifier.verify("busy@clinic.com").await.unwrap_err(),
        AppError::RateLimitExceeded
    ));
}
