//! Contact and social-profile extraction from raw page markup.
//!
//! Every function here is synchronous and works on a body that has already
//! been fetched. [`scraper::Html`] is not `Send`, so callers in async code
//! should go through [`PageContacts::from_page`], which parses, extracts and
//! drops the document in one step.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use url::Url;

use crate::classify::is_placeholder_email;
use crate::models::Platform;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9][a-z0-9._%+\-]*@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,24}\b")
        .expect("valid email regex")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?\(?\d[\d\s().\-]{7,20}\d").expect("valid phone regex")
});

/// `\u003e` and `\\u003e` as they appear in inline JSON.
static UNICODE_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\+u([0-9a-fA-F]{4})").expect("valid escape regex"));

/// Dates at the start of a phone candidate, with an optional time after.
static DATE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.]\d{4})(?:\s|T|$)")
        .expect("valid date regex")
});

static STREET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{1,5}\s+(?:[A-Z][A-Za-z0-9.']*\s+){1,4}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Parkway|Pkwy|Highway|Hwy|Place|Pl|Square|Sq)\b\.?(?:,?\s+(?:Suite|Ste|Unit|#)\s*[A-Za-z0-9\-]+)?(?:,\s*[A-Z][A-Za-z]+(?:\s[A-Z][A-Za-z]+)*)?(?:,\s*[A-Z]{2})?(?:\s+\d{5}(?:-\d{4})?)?",
    )
    .expect("valid street regex")
});

static JSONLD_LOCALITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""addressLocality"\s*:\s*"([^"]{2,80})""#).expect("valid locality regex")
});

static MAILTO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href^='mailto:'], a[href^='MAILTO:']").expect("valid selector"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

static LOCALITY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "meta[property='business:contact_data:locality'], meta[property='og:locality'], \
         meta[name='geo.placename'], [itemprop='addressLocality']",
    )
    .expect("valid selector")
});

struct ProfilePattern {
    platform: Platform,
    regex: Regex,
    /// First path segments that are share widgets, not profiles.
    ignored: &'static [&'static str],
}

static PROFILE_PATTERNS: LazyLock<Vec<ProfilePattern>> = LazyLock::new(|| {
    let build = |platform, pattern: &str, ignored| ProfilePattern {
        platform,
        regex: Regex::new(pattern).expect("valid profile regex"),
        ignored,
    };
    vec![
        build(
            Platform::Instagram,
            r"(?i)https?://(?:www\.)?instagram\.com/[A-Za-z0-9_.]+/?",
            &["p", "reel", "reels", "explore", "accounts", "stories", "tv"],
        ),
        build(
            Platform::Facebook,
            r"(?i)https?://(?:www\.|m\.|business\.)?facebook\.com/[A-Za-z0-9_.\-]+(?:/[A-Za-z0-9_.\-]+)?/?",
            &["sharer", "sharer.php", "share.php", "plugins", "tr", "dialog", "login", "policy.php", "events", "groups"],
        ),
        build(
            Platform::Twitter,
            r"(?i)https?://(?:www\.)?(?:twitter|x)\.com/[A-Za-z0-9_]+/?",
            &["intent", "share", "home", "search", "hashtag", "i", "widgets"],
        ),
        build(
            Platform::LinkedIn,
            r"(?i)https?://(?:[a-z]{2,3}\.)?linkedin\.com/(?:in|company|school)/[A-Za-z0-9_\-%.]+/?",
            &[],
        ),
        build(
            Platform::TikTok,
            r"(?i)https?://(?:www\.)?tiktok\.com/@[A-Za-z0-9_.]+/?",
            &[],
        ),
        build(
            Platform::YouTube,
            r"(?i)https?://(?:www\.)?youtube\.com/(?:@[A-Za-z0-9_.\-]+|channel/[A-Za-z0-9_\-]+|c/[A-Za-z0-9_\-]+|user/[A-Za-z0-9_\-]+)/?",
            &[],
        ),
    ]
});

/// Scan the raw body and `mailto:` anchors for email addresses.
///
/// Addresses are lowercased and placeholder/infra addresses are dropped.
pub fn extract_emails(raw_body: &str, doc: &Html) -> BTreeSet<String> {
    let mut emails = find_emails(raw_body);

    for anchor in doc.select(&MAILTO_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let target = &href["mailto:".len()..];
        let target = target.split('?').next().unwrap_or_default();
        emails.extend(find_emails(target));
    }

    emails
}

/// Regex-matched addresses in free text (social bios, snippets), lowercased,
/// without placeholders.
///
/// JSON `\uXXXX` and URL `%XX` escapes are decoded first so that an escaped
/// delimiter never fuses with the address after it.
pub fn find_emails(text: &str) -> BTreeSet<String> {
    let text = unescape(text);
    EMAIL_RE
        .find_iter(&text)
        .map(|m| m.as_str().trim_matches('.').to_lowercase())
        .filter(|email| !is_placeholder_email(email))
        .collect()
}

fn unescape(text: &str) -> Cow<'_, str> {
    let text = UNICODE_ESCAPE_RE.replace_all(text, |caps: &Captures| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| " ".to_string(), String::from)
    });
    if !text.contains('%') {
        return text;
    }
    Cow::Owned(percent_decode_str(&text).decode_utf8_lossy().into_owned())
}

/// Scan the raw body for phone-like digit groupings of 10–20 chars.
pub fn extract_phones(raw_body: &str) -> BTreeSet<String> {
    PHONE_RE
        .find_iter(raw_body)
        .filter_map(|m| {
            let candidate = m.as_str().trim();
            if DATE_PREFIX_RE.is_match(candidate) || is_clock_time(&raw_body[m.end()..]) {
                return None;
            }
            let len = candidate.chars().count();
            if !(10..=20).contains(&len) {
                return None;
            }
            let digits = candidate.chars().filter(char::is_ascii_digit).count();
            if !(10..=15).contains(&digits) {
                return None;
            }
            // Long unformatted digit runs are timestamps and IDs, not phones.
            let formatted = candidate
                .chars()
                .any(|c| matches!(c, ' ' | '-' | '.' | '(' | ')' | '+'));
            if !formatted && digits > 11 {
                return None;
            }
            Some(candidate.to_string())
        })
        .collect()
}

/// `10:30` style continuation: the match ran into the hour of a timestamp.
fn is_clock_time(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some(':') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Prefer a structured locality field, else the first street-address-shaped
/// match in the body.
pub fn extract_location(raw_body: &str, doc: &Html) -> Option<String> {
    for element in doc.select(&LOCALITY_SELECTOR) {
        let value = element
            .value()
            .attr("content")
            .map(str::to_string)
            .unwrap_or_else(|| element.text().collect::<String>());
        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if !value.is_empty() {
            return Some(value);
        }
    }

    if let Some(caps) = JSONLD_LOCALITY_RE.captures(raw_body) {
        return Some(caps[1].trim().to_string());
    }

    STREET_RE
        .find(raw_body)
        .map(|m| m.as_str().trim().trim_end_matches(',').to_string())
}

/// The first profile URL per platform, exactly as it appears in the page.
pub fn extract_social_profiles(raw_body: &str) -> BTreeMap<Platform, String> {
    let mut profiles = BTreeMap::new();
    for pattern in PROFILE_PATTERNS.iter() {
        let found = pattern.regex.find_iter(raw_body).find(|m| {
            let segment = first_path_segment(m.as_str());
            !segment.is_empty()
                && !pattern
                    .ignored
                    .iter()
                    .any(|ignored| segment.eq_ignore_ascii_case(ignored))
        });
        if let Some(m) = found {
            profiles.insert(pattern.platform, m.as_str().to_string());
        }
    }
    profiles
}

/// The platforms the page links a profile on.
pub fn detect_platforms(raw_body: &str) -> BTreeSet<Platform> {
    extract_social_profiles(raw_body).into_keys().collect()
}

fn first_path_segment(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split('/')
        .nth(1)
        .unwrap_or_default()
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
}

/// Find an anchor that looks like a contact (or, failing that, about) page
/// and resolve it against `base`.
pub fn find_contact_link(doc: &Html, base: &Url) -> Option<Url> {
    let anchors: Vec<(String, String)> = doc
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            let lower = href.to_lowercase();
            if href.is_empty()
                || href.starts_with('#')
                || lower.starts_with("mailto:")
                || lower.starts_with("tel:")
                || lower.starts_with("javascript:")
            {
                return None;
            }
            let text = a.text().collect::<String>().to_lowercase();
            Some((href.to_string(), format!("{text} {lower}")))
        })
        .collect();

    ["contact", "about"].iter().find_map(|keyword| {
        anchors
            .iter()
            .filter(|(_, haystack)| haystack.contains(keyword))
            .find_map(|(href, _)| {
                let url = base.join(href).ok()?;
                let same_page = url.as_str().trim_end_matches('/') == base.as_str().trim_end_matches('/');
                (matches!(url.scheme(), "http" | "https") && !same_page).then_some(url)
            })
    })
}

/// Everything the enrichment pipeline needs from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContacts {
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<String>,
    pub location: Option<String>,
    pub social_profiles: BTreeMap<Platform, String>,
    pub platforms: BTreeSet<Platform>,
    pub contact_link: Option<Url>,
}

impl PageContacts {
    /// Parse `body` and run every extractor over it.
    pub fn from_page(body: &str, base: &Url) -> Self {
        let doc = Html::parse_document(body);
        let social_profiles = extract_social_profiles(body);
        Self {
            emails: extract_emails(body, &doc),
            phones: extract_phones(body),
            location: extract_location(body, &doc),
            platforms: social_profiles.keys().copied().collect(),
            social_profiles,
            contact_link: find_contact_link(&doc, base),
        }
    }

    /// Fold a secondary page (contact/about) into this one.
    ///
    /// Emails and phones are unioned; fields already present win.
    pub fn merge(&mut self, other: PageContacts) {
        self.emails.extend(other.emails);
        self.phones.extend(other.phones);
        if self.location.is_none() {
            self.location = other.location;
        }
        for (platform, url) in other.social_profiles {
            self.social_profiles.entry(platform).or_insert(url);
        }
        self.platforms = self.social_profiles.keys().copied().collect();
    }
}
