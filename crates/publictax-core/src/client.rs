//! HTTP client for the county public tax search endpoint
//!
//! This module issues the paginated search requests. By default every fetch
//! is a single attempt; an optional retry policy with exponential backoff
//! and optional request pacing can be layered on through `ClientConfig`.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, TaxError};
use crate::types::QuerySpec;

/// Public tax portal host
pub const DEFAULT_BASE_URL: &str = "https://publictax.smith-county.com";

/// Search endpoint path, relative to the base URL
pub const SEARCH_PATH: &str = "/Search/Results";

/// Search field selector for "owner name"
const OWNER_NAME_FIELD: &str = "5";

/// Default User-Agent mimicking a modern browser
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Minimum spacing between consecutive requests
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter allowing at most `requests_per_second` requests.
    ///
    /// Returns `None` unless the rate is positive and yields a representable
    /// interval.
    pub fn new(requests_per_second: f64) -> Option<Self> {
        if requests_per_second.is_nan() || requests_per_second <= 0.0 {
            return None;
        }
        let min_interval = Duration::try_from_secs_f64(1.0 / requests_per_second).ok()?;
        Some(Self {
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    /// Wait until the next request is allowed, then claim the slot
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    #[cfg(test)]
    fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Retry behaviour for transient fetch failures.
///
/// Transport errors, HTTP 429 and HTTP 5xx are retried up to `max_retries`
/// times; every other status fails immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 1000,
        }
    }

    /// Exponential backoff starting at `base_delay_ms`
    pub fn exponential(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// Backoff before retry number `attempt` (0-based): base, 2x base, 4x base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Whether a failure on attempt `attempt` should be retried
    pub fn should_retry(&self, error: &TaxError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        match error {
            TaxError::Http(_) => true,
            TaxError::Network { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

/// Configuration for the search client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and host of the portal, without trailing slash
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Optional request pacing (default: unpaced)
    pub requests_per_second: Option<f64>,
    /// Retry policy (default: single attempt)
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            requests_per_second: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `PUBLICTAX_BASE_URL`, `PUBLICTAX_TIMEOUT_SECS`
    /// and `PUBLICTAX_MAX_RETRIES` when set and parsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("PUBLICTAX_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("PUBLICTAX_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            config.timeout_secs = secs;
        }
        if let Some(retries) = lookup("PUBLICTAX_MAX_RETRIES").and_then(|v| v.trim().parse().ok()) {
            config.retry.max_retries = retries;
        }
        config
    }
}

/// HTTP client for the search endpoint
pub struct TaxClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    rate_limiter: Option<RateLimiter>,
}

impl TaxClient {
    /// Create a new client with default configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
            rate_limiter: config.requests_per_second.and_then(RateLimiter::new),
        })
    }

    /// Portal base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full search URL for one query page
    pub fn search_url(&self, query: &QuerySpec) -> String {
        let params = [
            ("Query.SearchField", OWNER_NAME_FIELD.to_string()),
            ("Query.SearchText", query.search_text()),
            ("Query.SearchAction", String::new()),
            ("Query.IncludeInactiveAccounts", "False".to_string()),
            ("Query.PayStatus", "Unpaid".to_string()),
            ("Query.PageNumber", query.page().to_string()),
        ];
        let query_string = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}{}?{}", self.base_url, SEARCH_PATH, query_string)
    }

    /// Fetch the HTML of one search results page
    ///
    /// # Errors
    /// - `TaxError::Network` - Server returned a non-success status
    /// - `TaxError::Http` - Transport failure or timeout
    pub async fn fetch(&self, query: &QuerySpec) -> Result<String> {
        let url = self.search_url(query);
        let mut attempt = 0;

        loop {
            match self.fetch_once(&url).await {
                Ok(html) => return Ok(html),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        prefix = query.prefix(),
                        page = query.page(),
                        attempt = attempt + 1,
                        delay_ms = duration_millis(delay),
                        error = %e,
                        "Retrying search request"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        debug!(url, "GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(TaxError::Network {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
