use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use prospect_core::error::AppError;
use prospect_core::identity::IdentityPool;
use prospect_core::traits::{FetchedPage, Fetcher};
use reqwest::header::LOCATION;
use reqwest::{Client, Proxy, Response, redirect};
use url::Url;

/// Default redirect hops before a fetch gives up.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP fetcher using reqwest, with a fresh request identity per call.
///
/// Every request draws a new header set from the [`IdentityPool`] and, when
/// proxies are configured, goes out through a randomly chosen one. A client
/// is pre-built per proxy since reqwest binds proxies at the client level.
///
/// Any response is returned, including 4xx/5xx: error pages still carry
/// contact details often enough to be worth parsing.
///
/// By default, SSRF protection is **enabled**: requests to private/reserved
/// IP ranges are blocked. Redirects are followed hop by hop so every target
/// is checked, not just the first URL. Use
/// [`allow_private_urls`](Self::allow_private_urls) to disable this (e.g.,
/// for CLI usage where the user controls the machine), or
/// [`allow_host`](Self::allow_host) to exempt a single trusted host.
#[derive(Clone)]
pub struct ReqwestFetcher {
    direct: Client,
    /// Keyed by proxy URL.
    proxied: Arc<HashMap<String, Client>>,
    identities: Arc<IdentityPool>,
    ssrf_protection: bool,
    trusted_hosts: Arc<Vec<String>>,
    max_redirects: usize,
}

impl ReqwestFetcher {
    pub fn new(identities: Arc<IdentityPool>) -> Result<Self, AppError> {
        Self::with_max_redirects(identities, DEFAULT_MAX_REDIRECTS)
    }

    pub fn with_max_redirects(
        identities: Arc<IdentityPool>,
        max_redirects: usize,
    ) -> Result<Self, AppError> {
        let direct = build_client(None)?;
        let proxied = identities
            .proxies()
            .iter()
            .map(|proxy| Ok((proxy.url.clone(), build_client(Some(&proxy.url))?)))
            .collect::<Result<HashMap<_, _>, AppError>>()?;

        Ok(Self {
            direct,
            proxied: Arc::new(proxied),
            identities,
            ssrf_protection: true,
            trusted_hosts: Arc::new(Vec::new()),
            max_redirects,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    ///
    /// Only use this for CLI usage where the user controls the machine.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    /// Exempt `host` (e.g. a local endpoint mirror) from SSRF checks.
    ///
    /// Redirects from it to any other host are still checked.
    pub fn allow_host(mut self, host: &str) -> Self {
        Arc::make_mut(&mut self.trusted_hosts).push(host.to_ascii_lowercase());
        self
    }

    fn pick_client(&self) -> &Client {
        self.identities
            .next_proxy()
            .and_then(|proxy| self.proxied.get(&proxy.url))
            .unwrap_or(&self.direct)
    }

    async fn guard(&self, url: &Url) -> Result<(), AppError> {
        if !self.ssrf_protection {
            return Ok(());
        }
        let trusted = url.host_str().is_some_and(|host| {
            self.trusted_hosts
                .iter()
                .any(|trusted| trusted.eq_ignore_ascii_case(host))
        });
        if trusted {
            return Ok(());
        }
        validate_url(url).await
    }

    async fn fetch_following(&self, url: &str, timeout: Duration) -> Result<FetchedPage, AppError> {
        let mut current =
            Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{url}: {e}")))?;
        let client = self.pick_client();
        let headers = self.identities.next_headers();

        for _ in 0..=self.max_redirects {
            self.guard(&current).await?;

            let mut request = client.get(current.clone()).timeout(timeout);
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(timeout.as_secs())
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

            if response.status().is_redirection()
                && let Some(next) = redirect_target(&current, &response)
            {
                tracing::debug!(from = %current, to = %next, "Following redirect");
                current = next;
                continue;
            }
            return read_page(response, timeout).await;
        }

        Err(AppError::HttpError(format!("Too many redirects for {url}")))
    }
}

fn build_client(proxy: Option<&str>) -> Result<Client, AppError> {
    let mut builder = Client::builder()
        .redirect(redirect::Policy::none())
        .connect_timeout(CONNECT_TIMEOUT);
    if let Some(proxy) = proxy {
        let proxy = Proxy::all(proxy)
            .map_err(|e| AppError::ConfigError(format!("Invalid proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// The `Location` of a redirect response, resolved against `current`.
fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

async fn read_page(response: Response, timeout: Duration) -> Result<FetchedPage, AppError> {
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    if status == 429 {
        tracing::debug!(url = %final_url, "Rate limited by target");
    }

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            AppError::Timeout(timeout.as_secs())
        } else {
            AppError::HttpError(format!("Failed to read response body: {e}"))
        }
    })?;
    tracing::debug!(url = %final_url, status, bytes = body.len(), "Fetched");

    Ok(FetchedPage {
        url: final_url,
        status,
        body,
    })
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, AppError> {
        tokio::time::timeout(timeout, self.fetch_following(url, timeout))
            .await
            .map_err(|_| AppError::Timeout(timeout.as_secs()))?
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate a URL to prevent server-side request forgery (SSRF).
///
/// 1. Only allow `http` and `https` schemes.
/// 2. Resolve the hostname via DNS, bounded by a timeout.
/// 3. Reject if any resolved IP is private/reserved.
async fn validate_url(url: &Url) -> Result<(), AppError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidUrl(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| AppError::InvalidUrl("URL has no host".to_string()))?;

    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(AppError::HttpError(format!(
                "SSRF blocked: {host} resolves to private/reserved IP"
            )));
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host((host, port)))
        .await
        .map_err(|_| AppError::NetworkError(format!("DNS resolution timed out for {host}")))?
        .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    if let Some(blocked) = addrs.iter().find(|addr| is_private_ip(addr.ip())) {
        return Err(AppError::HttpError(format!(
            "SSRF blocked: {host} resolves to private/reserved IP {}",
            blocked.ip()
        )));
    }

    Ok(())
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local() // 169.254.0.0/16 (cloud metadata)
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // 100.64.0.0/10 (CGN)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xFFC0) == 0xFE80 // fe80::/10
                || (v6.segments()[0] & 0xFE00) == 0xFC00 // fc00::/7
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
