use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum snippet length (in chars) kept from a source result.
pub const MAX_SNIPPET_CHARS: usize = 200;

/// The public source a raw lead was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    GeneralSearch,
    SecondarySearch,
    Maps,
    Video,
    SocialBio,
}

impl LeadSource {
    /// Every source, in fan-out order.
    pub const ALL: [LeadSource; 5] = [
        LeadSource::GeneralSearch,
        LeadSource::SecondarySearch,
        LeadSource::Maps,
        LeadSource::Video,
        LeadSource::SocialBio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::GeneralSearch => "general_search",
            LeadSource::SecondarySearch => "secondary_search",
            LeadSource::Maps => "maps",
            LeadSource::Video => "video",
            LeadSource::SocialBio => "social_bio",
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown lead source: {s}"))
    }
}

/// Social platforms whose profile URLs are surfaced to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    Twitter,
    LinkedIn,
    TikTok,
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Instagram,
        Platform::Facebook,
        Platform::Twitter,
        Platform::LinkedIn,
        Platform::TikTok,
        Platform::YouTube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
        }
    }

    /// Column label used by the CSV export.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::Twitter => "Twitter",
            Platform::LinkedIn => "LinkedIn",
            Platform::TikTok => "TikTok",
            Platform::YouTube => "YouTube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate discovered by a source worker, before enrichment.
///
/// Immutable once built: enrichment wraps it into an [`EnrichedLead`]
/// rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLead {
    pub entity: String,
    /// May be empty (e.g. map listings), in which case enrichment is skipped.
    pub website: String,
    pub snippet: String,
    pub source: LeadSource,
    /// Address supplied by the source itself (social bios).
    #[serde(
        rename = "source_email",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub social_profiles: BTreeMap<Platform, String>,
}

impl RawLead {
    /// Build a raw lead, cleaning the entity and bounding the snippet.
    ///
    /// Returns `None` when nothing of the entity name survives cleaning.
    pub fn new(
        entity: &str,
        website: impl Into<String>,
        snippet: &str,
        source: LeadSource,
    ) -> Option<Self> {
        let entity = clean_entity(entity);
        if entity.is_empty() {
            return None;
        }
        Some(Self {
            entity,
            website: website.into().trim().to_string(),
            snippet: truncate_chars(&collapse_whitespace(snippet), MAX_SNIPPET_CHARS),
            source,
            email: None,
            role: None,
            social_profiles: BTreeMap::new(),
        })
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_profile(mut self, platform: Platform, url: impl Into<String>) -> Self {
        self.social_profiles.insert(platform, url.into());
        self
    }

    /// Case-insensitive identity used for deduplication: the website, or the
    /// entity name when there is no website.
    pub fn dedup_key(&self) -> String {
        let website = self.website.trim();
        if website.is_empty() {
            self.entity.trim().to_lowercase()
        } else {
            website.to_lowercase()
        }
    }
}

/// Drop every lead whose [`RawLead::dedup_key`] was already seen.
///
/// Keeps the first occurrence and the input order.
pub fn dedup_leads(leads: Vec<RawLead>) -> Vec<RawLead> {
    let mut seen = HashSet::new();
    leads
        .into_iter()
        .filter(|lead| seen.insert(lead.dedup_key()))
        .collect()
}

/// Coarse indicator of a lead's apparent financial capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WealthSignal {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl WealthSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            WealthSignal::High => "High",
            WealthSignal::Medium => "Medium",
            WealthSignal::Low => "Low",
            WealthSignal::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for WealthSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WealthSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(WealthSignal::High),
            "medium" | "mid" => Ok(WealthSignal::Medium),
            "low" => Ok(WealthSignal::Low),
            "unknown" => Ok(WealthSignal::Unknown),
            _ => Err(format!("Unknown wealth signal: {s}")),
        }
    }
}

/// Output of a quality scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub lead_score: u8,
    pub wealth_signal: WealthSignal,
    pub estimated_revenue: String,
}

impl QualityAssessment {
    pub const NEUTRAL_SCORE: u8 = 50;

    /// The fixed fallback used whenever the scorer is unavailable or its
    /// answer can't be trusted.
    pub fn neutral() -> Self {
        Self {
            lead_score: Self::NEUTRAL_SCORE,
            wealth_signal: WealthSignal::Medium,
            estimated_revenue: "Unknown".to_string(),
        }
    }

    /// Force the assessment into valid ranges.
    pub fn clamped(mut self) -> Self {
        self.lead_score = self.lead_score.min(100);
        let revenue = self.estimated_revenue.trim();
        self.estimated_revenue = if revenue.is_empty() {
            "Unknown".to_string()
        } else {
            revenue.to_string()
        };
        self
    }
}

/// Deliverability verdict of the email verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    Invalid,
    CatchAll,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verification {
    pub status: VerificationStatus,
    pub risk: RiskLevel,
}

impl Verification {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_valid_low_risk(&self) -> bool {
        self.status == VerificationStatus::Valid && self.risk == RiskLevel::Low
    }
}

/// A raw lead after contact extraction, verification and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedLead {
    #[serde(flatten)]
    pub raw: RawLead,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub platforms: BTreeSet<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founder_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(default)]
    pub wealth_signal: WealthSignal,
    #[serde(default)]
    pub lead_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_revenue: Option<String>,
}

impl EnrichedLead {
    /// A lead with every enrichment field empty or defaulted.
    ///
    /// Used for leads without a resolvable website and as the floor every
    /// failed enrichment falls back to.
    pub fn ghost(raw: RawLead) -> Self {
        let email = raw.email.clone();
        let platforms = raw.social_profiles.keys().copied().collect();
        Self {
            raw,
            email,
            phone: None,
            location: None,
            platforms,
            personal_email: None,
            founder_email: None,
            verification: None,
            wealth_signal: WealthSignal::Unknown,
            lead_score: 0,
            estimated_revenue: None,
        }
    }

    /// Intensity label shown next to the score.
    pub fn temperature(&self) -> &'static str {
        match self.lead_score {
            80.. => "Hot",
            50..=79 => "Warm",
            _ => "Cold",
        }
    }

    /// Profile URL for `platform`, if one was found.
    pub fn profile(&self, platform: Platform) -> Option<&str> {
        self.raw.social_profiles.get(&platform).map(String::as_str)
    }
}

/// Trim whitespace and dangling separators left over from page titles.
pub fn clean_entity(entity: &str) -> String {
    collapse_whitespace(entity)
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '-' | '|' | '·' | '•' | ':' | ',' | '–' | '—')
        })
        .to_string()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` chars without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
