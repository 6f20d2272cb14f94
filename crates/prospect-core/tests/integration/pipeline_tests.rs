use std::collections::HashSet;
use std::sync::Arc;

use prospect_core::models::{LeadSource, RawLead, RiskLevel, Verification, VerificationStatus, dedup_leads};
use prospect_core::progress::NullReporter;
use prospect_core::scan::{LeadPipeline, ScanOptions};
use prospect_core::testutil::{
    MockFetcher, MockScorer, MockVerifier, PanickingScorer, RecordingReporter, page, raw_lead,
};

use crate::common::{discovery, enrichment, leads, workers};

const JANE_PAGE: &str =
    "<html><body><h1>Austin Family Dental</h1><p>Dr. Jane Doe &lt;jane@gmail.com&gt;, info@clinic.com</p></body></html>";

#[tokio::test]
async fn dental_clinics_scenario() {
    let reporter = RecordingReporter::new();
    let discovered = discovery(workers([3, 0, 5, 2, 0]))
        .discover("dental clinics", "Austin, TX", 20, &reporter)
        .await;

    assert_eq!(discovered.len(), 10);
    let keys: HashSet<String> = discovered.iter().map(RawLead::dedup_key).collect();
    assert_eq!(keys.len(), 10);

    let svc = enrichment(MockFetcher::new(JANE_PAGE), MockVerifier::unknown(), MockScorer::neutral());
    let lead = svc
        .enrich_one(raw_lead("Austin Family Dental", "https://clinic.com", LeadSource::GeneralSearch))
        .await;
    assert_eq!(lead.email.as_deref(), Some("jane@gmail.com"));
    assert_eq!(lead.personal_email.as_deref(), Some("jane@gmail.com"));
}

#[test]
fn dedup_is_deterministic_and_case_insensitive() {
    let mut input = leads(LeadSource::GeneralSearch, 4);
    input.push(raw_lead("Other Name", "HTTPS://GENERAL-SEARCH-CLINIC-1.COM", LeadSource::SecondarySearch));
    input.push(raw_lead("Corner Bakery", "", LeadSource::Maps));
    input.push(raw_lead("corner bakery", "", LeadSource::Video));

    let once = dedup_leads(input);
    let twice = dedup_leads(once.clone());
    assert_eq!(once, twice);
    assert_eq!(once.len(), 5);

    let keys: HashSet<String> = once.iter().map(RawLead::dedup_key).collect();
    assert_eq!(keys.len(), once.len());
}

#[tokio::test]
async fn enrichment_never_fails_on_bad_websites() {
    let svc = enrichment(
        MockFetcher::with_error(prospect_core::AppError::NetworkError("unresolvable".into())),
        MockVerifier::unknown(),
        MockScorer::neutral(),
    );
    let garbage: String = "%$#@!~".chars().cycle().take(500).collect();
    for website in ["", "javascript:alert(1)", "ftp://files.example", garbage.as_str(), "http://unresolvable.invalid"] {
        let lead = svc
            .enrich_one(raw_lead("Broken Site", website, LeadSource::GeneralSearch))
            .await;
        assert!(lead.email.is_none(), "{website}");
        assert!(lead.phone.is_none());
        assert_eq!(lead.lead_score, 50);
    }
}

#[tokio::test]
async fn map_listings_are_scored_like_any_lead() {
    let svc = enrichment(
        MockFetcher::new(JANE_PAGE),
        MockVerifier::unknown(),
        MockScorer::failing(),
    );
    let out = svc
        .enrich_all(
            vec![raw_lead("Corner Bakery", "", LeadSource::Maps)],
            &NullReporter,
        )
        .await;
    assert_eq!(out[0].lead_score, 50);
    assert_eq!(out[0].wealth_signal, prospect_core::WealthSignal::Medium);
    assert_eq!(out[0].estimated_revenue.as_deref(), Some("Unknown"));
}

#[tokio::test]
async fn personal_email_beats_founder_email() {
    let body = "<html>Contact ceo@smile-dental.com or maria.smith@yahoo.com</html>";
    let svc = enrichment(MockFetcher::new(body), MockVerifier::unknown(), MockScorer::neutral());
    let lead = svc
        .enrich_one(raw_lead("Smile Dental", "smile-dental.com", LeadSource::GeneralSearch))
        .await;
    assert_eq!(lead.email.as_deref(), Some("maria.smith@yahoo.com"));
    assert_eq!(lead.founder_email.as_deref(), Some("ceo@smile-dental.com"));
}

#[tokio::test]
async fn scores_stay_in_bounds() {
    let verdict = Verification {
        status: VerificationStatus::Valid,
        risk: RiskLevel::Low,
    };
    let svc = enrichment(
        MockFetcher::new(JANE_PAGE),
        MockVerifier::with_verdict(verdict),
        MockScorer::with_assessment(prospect_core::models::QualityAssessment {
            lead_score: 255,
            wealth_signal: prospect_core::WealthSignal::High,
            estimated_revenue: String::new(),
        }),
    );
    let mut raws = leads(LeadSource::GeneralSearch, 6);
    raws.push(raw_lead("Bio Lead", "", LeadSource::SocialBio).with_email("bio@gmail.com"));
    raws.push(raw_lead("Map Lead", "", LeadSource::Maps));

    for lead in svc.enrich_all(raws, &NullReporter).await {
        assert!(lead.lead_score <= 100, "{}", lead.raw.entity);
    }
}

#[tokio::test]
async fn one_failing_lead_does_not_affect_its_batch() {
    let raws = vec![
        raw_lead("Lead 0", "https://lead-0.com", LeadSource::GeneralSearch),
        raw_lead("Lead 1", "https://lead-1.com", LeadSource::GeneralSearch),
        raw_lead("Lead 2", "https://lead-2.com", LeadSource::GeneralSearch),
    ];
    let svc = enrichment(
        MockFetcher::new(JANE_PAGE),
        MockVerifier::unknown(),
        PanickingScorer::for_entity("Lead 1"),
    );

    let out = svc.enrich_all(raws, &NullReporter).await;
    assert_eq!(out.len(), 3);
    let by_name = |name: &str| out.iter().find(|l| l.raw.entity == name).unwrap();
    assert_eq!(by_name("Lead 0").email.as_deref(), Some("jane@gmail.com"));
    assert_eq!(by_name("Lead 2").email.as_deref(), Some("jane@gmail.com"));
    assert_eq!(by_name("Lead 0").lead_score, 50);
    assert_eq!(by_name("Lead 2").lead_score, 50);
    assert_eq!(by_name("Lead 1").email.as_deref(), Some("jane@gmail.com"));
    assert_eq!(by_name("Lead 1").lead_score, 50);
}

#[tokio::test]
async fn failing_scorer_yields_neutral_plus_bonus() {
    let valid = Verification {
        status: VerificationStatus::Valid,
        risk: RiskLevel::Low,
    };
    let risky = Verification {
        status: VerificationStatus::Valid,
        risk: RiskLevel::High,
    };

    for (verdict, expected) in [(valid, 60), (risky, 50)] {
        let svc = enrichment(
            MockFetcher::new(JANE_PAGE),
            MockVerifier::with_verdict(verdict),
            MockScorer::failing(),
        );
        let out = svc
            .enrich_all(leads(LeadSource::GeneralSearch, 4), &NullReporter)
            .await;
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|l| l.lead_score == expected));
    }
}

#[tokio::test]
async fn full_scan_over_mocks() {
    let fetcher = MockFetcher::with_pages(vec![Ok(page("https://clinic.com/", 500, JANE_PAGE))]);
    let pipeline = Arc::new(LeadPipeline::new(
        discovery(workers([1, 0, 0, 0, 0])),
        enrichment(fetcher, MockVerifier::unknown(), MockScorer::neutral()),
        ScanOptions::default(),
    ));
    let reporter = RecordingReporter::new();

    let handle = pipeline
        .scan("dental clinics in Austin, TX", 20, Arc::new(reporter.clone()))
        .unwrap();
    let leads = handle.wait().await.unwrap();

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].email.as_deref(), Some("jane@gmail.com"));
    assert!(reporter.count_containing("fragment missing") >= 4);
    assert_eq!(reporter.count_containing("100%"), 1);
}
