use std::time::Duration;

use crate::enrich::EnrichConfig;
use crate::error::AppError;
use crate::identity::ProxyConfig;
use crate::retry::RetryPolicy;
use crate::scan::ScanOptions;

/// Pacing of the social-bio profile fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialBatchConfig {
    /// Profiles fetched concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub delay: Duration,
}

impl Default for SocialBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay: Duration::from_millis(1500),
        }
    }
}

/// Everything needed to assemble a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub enrich: EnrichConfig,
    pub social: SocialBatchConfig,
    pub proxies: Vec<ProxyConfig>,
    pub scan: ScanOptions,
}

impl PipelineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PROSPECT_CONCURRENCY` (optional, defaults to 50)
    /// - `PROSPECT_PROXIES` (optional, comma-separated proxy URLs)
    /// - `PROSPECT_PAGE_TIMEOUT_SECS` (optional, defaults to 15)
    /// - `PROSPECT_SCAN_DEADLINE_SECS` (optional, no deadline by default)
    /// - `PROSPECT_RETRY_ATTEMPTS` (optional, defaults to 5)
    /// - `PROSPECT_SOCIAL_BATCH_DELAY_MS` (optional, defaults to 1500)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(n) = positive(&lookup, "PROSPECT_CONCURRENCY")? {
            config.enrich.concurrency = n as usize;
        }
        if let Some(secs) = positive(&lookup, "PROSPECT_PAGE_TIMEOUT_SECS")? {
            config.enrich.page_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = positive(&lookup, "PROSPECT_SCAN_DEADLINE_SECS")? {
            config.scan.deadline = Some(Duration::from_secs(secs));
        }
        if let Some(attempts) = positive(&lookup, "PROSPECT_RETRY_ATTEMPTS")? {
            config.retry.attempts = u32::try_from(attempts).map_err(|_| {
                AppError::ConfigError(format!("PROSPECT_RETRY_ATTEMPTS is too large: {attempts}"))
            })?;
        }
        if let Some(raw) = lookup("PROSPECT_SOCIAL_BATCH_DELAY_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid PROSPECT_SOCIAL_BATCH_DELAY_MS '{raw}': must be a non-negative integer"
                ))
            })?;
            config.social.delay = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("PROSPECT_PROXIES") {
            config.proxies = parse_proxies(&raw)?;
        }

        Ok(config)
    }
}

/// Parse a comma-separated proxy list, ignoring blank entries.
pub fn parse_proxies(raw: &str) -> Result<Vec<ProxyConfig>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ProxyConfig::parse)
        .collect()
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let parsed: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.enrich.concurrency, 50);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.social.batch_size, 10);
        assert!(config.scan.deadline.is_none());
    }

    #[test]
    fn reads_every_setting() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("PROSPECT_CONCURRENCY", "8"),
            ("PROSPECT_PAGE_TIMEOUT_SECS", "5"),
            ("PROSPECT_SCAN_DEADLINE_SECS", "120"),
            ("PROSPECT_RETRY_ATTEMPTS", "3"),
            ("PROSPECT_SOCIAL_BATCH_DELAY_MS", "0"),
            ("PROSPECT_PROXIES", "http://10.0.0.1:8080, socks5://10.0.0.2:1080,"),
        ]))
        .unwrap();
        assert_eq!(config.enrich.concurrency, 8);
        assert_eq!(config.enrich.page_timeout, Duration::from_secs(5));
        assert_eq!(config.scan.deadline, Some(Duration::from_secs(120)));
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.social.delay, Duration::ZERO);
        assert_eq!(config.proxies.len(), 2);
    }

    #[test]
    fn rejects_invalid_values() {
        for (key, value) in [
            ("PROSPECT_CONCURRENCY", "0"),
            ("PROSPECT_CONCURRENCY", "lots"),
            ("PROSPECT_PAGE_TIMEOUT_SECS", "-1"),
            ("PROSPECT_PROXIES", "ftp://nope:21"),
        ] {
            let err = PipelineConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(matches!(err, AppError::ConfigError(_)), "{key}={value}");
        }
    }
}
