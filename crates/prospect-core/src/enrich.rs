use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::classify::select_email;
use crate::error::AppError;
use crate::extract::PageContacts;
use crate::models::{EnrichedLead, QualityAssessment, RawLead, WealthSignal, truncate_chars};
use crate::progress::ProgressReporter;
use crate::traits::{Cleaner, EmailVerifier, Fetcher, QualityScorer};

/// Tuning knobs for [`EnrichmentService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichConfig {
    /// Leads enriched concurrently per batch.
    pub concurrency: usize,
    /// Timeout for the landing page fetch.
    pub page_timeout: Duration,
    /// Timeout for the contact/about page fallback.
    pub contact_timeout: Duration,
    /// Score given to leads whose source already supplied an email.
    pub short_circuit_score: u8,
    /// Bonus for an email verified as valid and low risk.
    pub verify_bonus: u8,
    /// Maximum chars of page text passed to the scorer.
    pub excerpt_chars: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            page_timeout: Duration::from_secs(15),
            contact_timeout: Duration::from_secs(8),
            short_circuit_score: 85,
            verify_bonus: 10,
            excerpt_chars: 3000,
        }
    }
}

/// Turns raw leads into enriched leads.
///
/// Generic over all external dependencies via traits so tests never touch
/// the network. Every lead comes back: failures degrade a lead, they never
/// drop it or abort its batch.
pub struct EnrichmentService<F, C, V, Q>
where
    F: Fetcher,
    C: Cleaner,
    V: EmailVerifier,
    Q: QualityScorer,
{
    fetcher: F,
    cleaner: C,
    verifier: V,
    scorer: Q,
    config: EnrichConfig,
}

impl<F, C, V, Q> EnrichmentService<F, C, V, Q>
where
    F: Fetcher,
    C: Cleaner,
    V: EmailVerifier,
    Q: QualityScorer,
{
    pub fn new(fetcher: F, cleaner: C, verifier: V, scorer: Q, config: EnrichConfig) -> Self {
        Self {
            fetcher,
            cleaner,
            verifier,
            scorer,
            config,
        }
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Enrich every lead in bounded concurrent batches.
    pub async fn enrich_all(
        &self,
        raw: Vec<RawLead>,
        reporter: &dyn ProgressReporter,
    ) -> Vec<EnrichedLead> {
        self.enrich_all_until(raw, reporter, None, &CancellationToken::new())
            .await
    }

    /// [`enrich_all`](Self::enrich_all) with an optional wall-clock deadline
    /// and a cancellation token.
    ///
    /// Once either fires, leads of the current batch that already finished
    /// are kept and every other lead is returned in its ghost form.
    pub async fn enrich_all_until(
        &self,
        raw: Vec<RawLead>,
        reporter: &dyn ProgressReporter,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Vec<EnrichedLead> {
        let total = raw.len();
        let batch_size = self.config.concurrency.max(1);
        let mut enriched = Vec::with_capacity(total);
        let mut pending = raw.into_iter();
        let mut interrupt = pin!(interrupted(cancel, deadline));

        if total > 0 {
            reporter.info(&format!(
                "Enriching {total} leads in batches of {batch_size}"
            ));
        }

        loop {
            let batch: Vec<RawLead> = pending.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let mut slots: Vec<Option<EnrichedLead>> = batch.iter().map(|_| None).collect();
            let mut stopped =
                cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d);
            if !stopped {
                let mut in_flight: FuturesUnordered<_> = batch
                    .iter()
                    .cloned()
                    .enumerate()
                    .map(|(index, lead)| self.enrich_one(lead).map(move |out| (index, out)))
                    .collect();
                loop {
                    tokio::select! {
                        biased;
                        _ = &mut interrupt => {
                            stopped = true;
                            break;
                        }
                        next = in_flight.next() => match next {
                            Some((index, lead)) => slots[index] = Some(lead),
                            None => break,
                        },
                    }
                }
            }

            if stopped {
                let unfinished = slots.iter().filter(|slot| slot.is_none()).count();
                let skipped = unfinished + pending.len();
                tracing::warn!(skipped, "Enrichment interrupted");
                reporter.warning(&format!(
                    "Enrichment stopped early, {skipped} leads returned unenriched"
                ));
                enriched.extend(
                    slots
                        .into_iter()
                        .zip(batch)
                        .map(|(slot, raw)| slot.unwrap_or_else(|| EnrichedLead::ghost(raw))),
                );
                enriched.extend(pending.map(EnrichedLead::ghost));
                break;
            }

            enriched.extend(slots.into_iter().flatten());
            let pct = enriched.len() * 100 / total;
            reporter.info(&format!(
                "Enrichment {pct}% ({}/{total})",
                enriched.len()
            ));
        }

        enriched
    }

    /// Enrich a single lead. Never fails and never panics.
    ///
    /// The site visit, the verifier and the scorer are each isolated, so a
    /// failure or panic in one keeps whatever the others produced. A lead
    /// without a usable site is still scored, from its search snippet.
    pub async fn enrich_one(&self, raw: RawLead) -> EnrichedLead {
        // The source already found an email: no page visit needed.
        if raw.email.is_some() {
            return self.short_circuit(raw);
        }

        let visit = match AssertUnwindSafe(self.visit(&raw)).catch_unwind().await {
            Ok(visit) => visit,
            Err(_) => {
                tracing::error!(entity = %raw.entity, "Site visit panicked, scoring without it");
                None
            }
        };

        let mut lead = EnrichedLead::ghost(raw);
        let excerpt = match visit {
            Some(visit) => {
                apply_contacts(&mut lead, visit.contacts);
                self.excerpt(&visit.body)
            }
            None => truncate_chars(lead.raw.snippet.trim(), self.config.excerpt_chars),
        };

        let bonus = self.verify(&mut lead).await;
        let assessment = self.assess(&lead, &excerpt).await;
        lead.lead_score = assessment.lead_score.saturating_add(bonus).min(100);
        lead.wealth_signal = assessment.wealth_signal;
        lead.estimated_revenue = Some(assessment.estimated_revenue);
        lead
    }

    /// Fetch the landing page, plus the contact page when the landing page
    /// has no email, and extract from both. `None` when there is no
    /// reachable site.
    async fn visit(&self, raw: &RawLead) -> Option<SiteVisit> {
        if raw.website.trim().is_empty() {
            return None;
        }

        let url = match normalize_website(&raw.website) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(entity = %raw.entity, error = %e, "Skipping site visit");
                return None;
            }
        };

        let page = match self.fetcher.fetch(url.as_str(), self.config.page_timeout).await {
            Ok(page) => page,
            Err(e) => {
                tracing::info!(url = %url, error = %e, "Lead website unreachable");
                return None;
            }
        };
        if !page.is_success() {
            tracing::debug!(url = %url, status = page.status, "Parsing non-success response");
        }
        let page_url = Url::parse(&page.url).unwrap_or_else(|_| url.clone());

        let mut contacts = PageContacts::from_page(&page.body, &page_url);
        if contacts.emails.is_empty()
            && let Some(link) = contacts.contact_link.clone()
        {
            match self
                .fetcher
                .fetch(link.as_str(), self.config.contact_timeout)
                .await
            {
                Ok(contact_page) => {
                    contacts.merge(PageContacts::from_page(&contact_page.body, &link));
                }
                Err(e) => {
                    tracing::debug!(url = %link, error = %e, "Contact page unreachable");
                }
            }
        }

        Some(SiteVisit {
            contacts,
            body: page.body,
        })
    }

    /// Record the verifier's verdict and return the score bonus it earns.
    async fn verify(&self, lead: &mut EnrichedLead) -> u8 {
        let Some(email) = lead.email.clone() else {
            return 0;
        };
        match AssertUnwindSafe(self.verifier.verify(&email)).catch_unwind().await {
            Ok(Ok(verdict)) => {
                lead.verification = Some(verdict);
                if verdict.is_valid_low_risk() {
                    self.config.verify_bonus
                } else {
                    0
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(%email, error = %e, "Verification failed");
                0
            }
            Err(_) => {
                tracing::error!(%email, "Verifier panicked");
                0
            }
        }
    }

    async fn assess(&self, lead: &EnrichedLead, excerpt: &str) -> QualityAssessment {
        let entity = &lead.raw.entity;
        let call = self.scorer.assess(entity, excerpt, lead.email.as_deref());
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(assessment)) => assessment.clamped(),
            Ok(Err(e)) => {
                tracing::warn!(%entity, error = %e, "Scorer failed, using neutral assessment");
                QualityAssessment::neutral()
            }
            Err(_) => {
                tracing::error!(%entity, "Scorer panicked, using neutral assessment");
                QualityAssessment::neutral()
            }
        }
    }

    fn short_circuit(&self, raw: RawLead) -> EnrichedLead {
        let mut lead = EnrichedLead::ghost(raw);
        let selection = select_email(lead.email.iter());
        lead.personal_email = selection.personal;
        lead.founder_email = selection.founder;
        lead.lead_score = self.config.short_circuit_score.min(100);
        lead.wealth_signal = WealthSignal::High;
        lead
    }

    fn excerpt(&self, html: &str) -> String {
        match panic::catch_unwind(AssertUnwindSafe(|| self.cleaner.clean(html))) {
            Ok(Ok(text)) => truncate_chars(text.trim(), self.config.excerpt_chars),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Cleaner failed, scoring without excerpt");
                String::new()
            }
            Err(_) => {
                tracing::error!("Cleaner panicked, scoring without excerpt");
                String::new()
            }
        }
    }
}

/// What one visit to a lead's website produced.
struct SiteVisit {
    contacts: PageContacts,
    body: String,
}

/// Copy extracted contacts onto `lead`. Profiles supplied by the source win.
fn apply_contacts(lead: &mut EnrichedLead, contacts: PageContacts) {
    let selection = select_email(&contacts.emails);
    lead.email = selection.email;
    lead.personal_email = selection.personal;
    lead.founder_email = selection.founder;

    lead.phone = contacts.phones.into_iter().next();
    lead.location = contacts.location;
    for (platform, url) in contacts.social_profiles {
        lead.raw.social_profiles.entry(platform).or_insert(url);
    }
    lead.platforms.extend(contacts.platforms);
    lead.platforms.extend(lead.raw.social_profiles.keys().copied());
}

/// Resolves when the scan is cancelled or the deadline passes.
async fn interrupted(cancel: &CancellationToken, deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
        None => cancel.cancelled().await,
    }
}

/// Turn a scraped website value into an absolute http(s) URL.
///
/// Bare hosts get `https://`; anything without a host or with another scheme
/// is rejected.
pub fn normalize_website(website: &str) -> Result<Url, AppError> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidUrl("empty website".into()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| AppError::InvalidUrl(format!("{trimmed}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidUrl(format!(
            "unsupported scheme '{}' in {trimmed}",
            url.scheme()
        )));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(AppError::InvalidUrl(format!("no host in {trimmed}"))),
    }
}
