//! Email address classification.
//!
//! Pure functions that bucket an address into personal / generic-role /
//! founder-like / business, plus the placeholder filter applied before any
//! address reaches the classifier.

/// Free-mail providers. An address on one of these is treated as an
/// individually owned mailbox.
const PERSONAL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "yahoo.co.uk",
    "ymail.com",
    "hotmail.com",
    "hotmail.co.uk",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "gmx.de",
    "mail.com",
    "zoho.com",
    "yandex.com",
];

/// Shared-inbox aliases. Matched against the whole local part or its prefix.
const GENERIC_ALIASES: &[&str] = &[
    "info",
    "contact",
    "contactus",
    "support",
    "hello",
    "admin",
    "sales",
    "office",
    "team",
    "help",
    "enquiries",
    "inquiries",
    "booking",
    "bookings",
    "reception",
    "marketing",
    "billing",
    "noreply",
    "no-reply",
    "webmaster",
    "mail",
];

const FOUNDER_KEYWORDS: &[&str] = &["founder", "ceo", "owner", "director", "president", "chief"];

/// Domains that only ever show up as examples, SDK endpoints or trackers.
const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "domain.com",
    "email.com",
    "yourdomain.com",
    "yoursite.com",
    "test.com",
    "sentry.io",
    "sentry.wixpress.com",
    "sentry-next.wixpress.com",
    "wixpress.com",
    "wix.com",
    "godaddy.com",
    "squarespace.com",
    "schema.org",
    "w3.org",
];

const PLACEHOLDER_LOCALS: &[&str] = &["user", "name", "username", "your", "youremail", "email"];

const ASSET_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".bmp", ".css", ".js",
];

fn split(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some((local, domain))
}

/// True when the domain is a free-mail provider.
pub fn is_personal_email(email: &str) -> bool {
    split(email).is_some_and(|(_, domain)| {
        let domain = domain.to_lowercase();
        PERSONAL_DOMAINS.contains(&domain.as_str())
    })
}

/// True when the local part is a role alias, alone or followed by a
/// separator or digit (`info`, `info-austin`, `sales2`).
pub fn is_generic_email(email: &str) -> bool {
    split(email).is_some_and(|(local, _)| {
        let local = local.to_lowercase();
        GENERIC_ALIASES.iter().any(|alias| {
            local.strip_prefix(alias).is_some_and(|rest| {
                rest.chars()
                    .next()
                    .is_none_or(|c| matches!(c, '.' | '-' | '_' | '+') || c.is_ascii_digit())
            })
        })
    })
}

/// True when the local part contains an executive/ownership keyword.
pub fn is_founder_email(email: &str) -> bool {
    split(email).is_some_and(|(local, _)| {
        let local = local.to_lowercase();
        FOUNDER_KEYWORDS.iter().any(|kw| local.contains(kw))
    })
}

/// True for sentinel addresses that must never be surfaced: example and
/// tracking domains, template placeholders and image filenames that happen
/// to look like `name@2x.png`.
pub fn is_placeholder_email(email: &str) -> bool {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = split(&email) else {
        return true;
    };
    if ASSET_SUFFIXES.iter().any(|suffix| domain.ends_with(suffix)) {
        return true;
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return true;
    }
    if PLACEHOLDER_DOMAINS
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
    {
        return true;
    }
    // Hex-ish local parts are SDK keys (sentry DSNs and similar).
    if local.len() >= 24 && local.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }
    PLACEHOLDER_LOCALS.contains(&local)
}

/// Outcome of ranking the addresses found for one lead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailSelection {
    /// The canonical address: personal, else founder, else first business.
    pub email: Option<String>,
    pub personal: Option<String>,
    pub founder: Option<String>,
    /// Non-personal, non-generic addresses in input order.
    pub business: Vec<String>,
}

/// Rank extracted addresses and pick the one most likely to be monitored.
///
/// Precedence: personal > founder-classified business > first remaining
/// non-generic business address. Generic role inboxes are never selected.
pub fn select_email<'a, I>(emails: I) -> EmailSelection
where
    I: IntoIterator<Item = &'a String>,
{
    let mut selection = EmailSelection::default();

    for email in emails {
        if is_placeholder_email(email) {
            continue;
        }
        if is_personal_email(email) {
            if selection.personal.is_none() {
                selection.personal = Some(email.clone());
            }
            continue;
        }
        if is_generic_email(email) {
            continue;
        }
        if is_founder_email(email) && selection.founder.is_none() {
            selection.founder = Some(email.clone());
        }
        selection.business.push(email.clone());
    }

    selection.email = selection
        .personal
        .clone()
        .or_else(|| selection.founder.clone())
        .or_else(|| selection.business.first().cloned());
    selection
}
