//! Request identity rotation.
//!
//! Supplies a randomized browser header set and an optional outbound proxy
//! for every request, so no single request pattern repeats long enough to be
//! rate-limited. The pool is read-only: it is built once at start-up and
//! shared behind an `Arc` by every fetcher.
//!
//! # Example
//!
//! ```rust
//! use prospect_core::identity::{IdentityPool, ProxyConfig};
//!
//! let pool = IdentityPool::builtin()
//!     .with_proxies(vec![ProxyConfig::parse("http://10.0.0.1:8080").unwrap()]);
//! let headers = pool.next_headers();
//! assert!(headers.iter().any(|(name, _)| name == "User-Agent"));
//! assert_eq!(pool.next_proxy().map(|p| p.url.as_str()), Some("http://10.0.0.1:8080"));
//! ```

use std::net::Ipv4Addr;

use rand::Rng;
use rand::seq::IndexedRandom;
use url::Url;

use crate::error::AppError;

/// Headers that receive a freshly generated client address on every call.
pub const FORWARDED_IP_HEADERS: [&str; 3] = ["X-Forwarded-For", "X-Real-IP", "X-Client-IP"];

/// One realistic browser header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Client hints (`Sec-CH-UA*`); empty for browsers that don't send them.
    pub client_hints: Vec<(String, String)>,
}

impl HeaderProfile {
    fn chromium(user_agent: &str, brand: &str, platform: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            client_hints: vec![
                ("Sec-CH-UA".to_string(), brand.to_string()),
                ("Sec-CH-UA-Mobile".to_string(), "?0".to_string()),
                ("Sec-CH-UA-Platform".to_string(), format!("\"{platform}\"")),
            ],
        }
    }

    fn plain(user_agent: &str, accept_language: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: accept_language.to_string(),
            client_hints: Vec::new(),
        }
    }

    /// The built-in desktop browser pool.
    pub fn builtin() -> Vec<HeaderProfile> {
        vec![
            Self::chromium(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
                "Windows",
            ),
            Self::chromium(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
                "\"Google Chrome\";v=\"123\", \"Not:A-Brand\";v=\"8\", \"Chromium\";v=\"123\"",
                "macOS",
            ),
            Self::chromium(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
                "\"Chromium\";v=\"124\", \"Microsoft Edge\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
                "Windows",
            ),
            Self::plain(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
                "en-US,en;q=0.9",
            ),
            Self::plain(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
                "en-US,en;q=0.5",
            ),
            Self::plain(
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
                "en-GB,en;q=0.7",
            ),
        ]
    }

    fn to_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept".to_string(), self.accept.clone()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
            ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
        ];
        headers.extend(self.client_hints.iter().cloned());
        headers
    }
}

/// An outbound proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
}

impl ProxyConfig {
    /// Accepts `http://`, `https://`, `socks5://` and `socks5h://` URLs,
    /// optionally with credentials.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        let url = Url::parse(raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid proxy URL '{raw}': {e}")))?;
        match url.scheme() {
            "http" | "https" | "socks5" | "socks5h" => {}
            scheme => {
                return Err(AppError::ConfigError(format!(
                    "Proxy scheme '{scheme}' is not supported (http, https, socks5)"
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(AppError::ConfigError(format!("Proxy URL '{raw}' has no host")));
        }
        Ok(Self {
            url: raw.to_string(),
        })
    }
}

/// Fixed pool of header profiles and proxies.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    profiles: Vec<HeaderProfile>,
    proxies: Vec<ProxyConfig>,
}

impl IdentityPool {
    pub fn new(profiles: Vec<HeaderProfile>) -> Self {
        Self {
            profiles,
            proxies: Vec::new(),
        }
    }

    /// Pool with the built-in browser profiles and no proxies.
    pub fn builtin() -> Self {
        Self::new(HeaderProfile::builtin())
    }

    pub fn with_proxies(mut self, proxies: Vec<ProxyConfig>) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn proxies(&self) -> &[ProxyConfig] {
        &self.proxies
    }

    /// A random header profile with a fresh forwarded-IP value.
    pub fn next_headers(&self) -> Vec<(String, String)> {
        let mut rng = rand::rng();
        let mut headers = self
            .profiles
            .choose(&mut rng)
            .map(HeaderProfile::to_headers)
            .unwrap_or_default();
        let ip = random_public_ipv4(&mut rng).to_string();
        headers.extend(
            FORWARDED_IP_HEADERS
                .iter()
                .map(|name| (name.to_string(), ip.clone())),
        );
        headers
    }

    /// A randomly chosen proxy, or `None` when no proxies are configured.
    pub fn next_proxy(&self) -> Option<&ProxyConfig> {
        self.proxies.choose(&mut rand::rng())
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A random address outside private, loopback and reserved ranges.
fn random_public_ipv4(rng: &mut impl Rng) -> Ipv4Addr {
    loop {
        let ip = Ipv4Addr::new(
            rng.random_range(1..=223),
            rng.random(),
            rng.random(),
            rng.random_range(1..=254),
        );
        let [a, b, ..] = ip.octets();
        let reserved = ip.is_private()
            || ip.is_loopback()
            || ip.is_link_local()
            || ip.is_documentation()
            || a == 0
            || (a == 100 && (b & 0xC0) == 64);
        if !reserved {
            return ip;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn next_headers_includes_profile_and_forwarded_ip() {
        let pool = IdentityPool::builtin();
        let headers = pool.next_headers();
        let ua = header(&headers, "User-Agent").unwrap();
        assert!(ua.starts_with("Mozilla/5.0"));
        assert!(header(&headers, "Accept-Language").is_some());

        let forwarded = header(&headers, "X-Forwarded-For").unwrap();
        let ip: Ipv4Addr = forwarded.parse().unwrap();
        assert!(!ip.is_private());
        assert_eq!(header(&headers, "X-Real-IP"), Some(forwarded));
    }

    #[test]
    fn forwarded_ip_changes_between_calls() {
        let pool = IdentityPool::builtin();
        let ips: std::collections::HashSet<String> = (0..20)
            .map(|_| {
                header(&pool.next_headers(), "X-Forwarded-For")
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert!(ips.len() > 1);
    }

    #[test]
    fn random_ips_are_public() {
        let mut rng = rand::rng();
        for _ in 0..500 {
            let ip = random_public_ipv4(&mut rng);
            assert!(!ip.is_private() && !ip.is_loopback() && ip.octets()[0] != 0);
        }
    }

    #[test]
    fn next_proxy_none_without_pool() {
        let pool = IdentityPool::builtin();
        assert!(pool.proxies().is_empty());
        assert!(pool.next_proxy().is_none());
    }

    #[test]
    fn next_proxy_picks_from_pool() {
        let proxies = vec![
            ProxyConfig::parse("http://10.0.0.1:8080").unwrap(),
            ProxyConfig::parse("socks5://user:pw@10.0.0.2:1080").unwrap(),
        ];
        let pool = IdentityPool::builtin().with_proxies(proxies.clone());
        for _ in 0..20 {
            let proxy = pool.next_proxy().unwrap();
            assert!(proxies.contains(proxy));
        }
    }

    #[test]
    fn proxy_config_rejects_bad_urls() {
        assert!(ProxyConfig::parse("ftp://proxy:21").is_err());
        assert!(ProxyConfig::parse("not a url").is_err());
        assert!(ProxyConfig::parse(" https://proxy.example:443 ").is_ok());
    }

    #[test]
    fn empty_profile_pool_still_sets_forwarded_ip() {
        let pool = IdentityPool::new(Vec::new());
        let headers = pool.next_headers();
        assert!(header(&headers, "User-Agent").is_none());
        assert!(header(&headers, "X-Client-IP").is_some());
    }
}
