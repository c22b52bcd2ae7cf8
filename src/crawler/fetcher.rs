//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for an audit, including:
//! - Building the shared HTTP client with the configured user agent
//! - Serving fresh pages from the cache store
//! - Retry with exponential backoff for transient failures
//! - Per-host politeness spacing
//! - Error classification into `FetchError`

use crate::cache::{CacheRecord, CacheStore};
use crate::config::{CacheConfig, FetcherConfig, UserAgentConfig};
use crate::state::HostState;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

/// Longest backoff between two attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Per-page fetch failure
///
/// Recorded in the page result; never aborts the job on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP error status {status}")]
    Http { status: u16 },

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Timeouts, connection failures and 5xx responses are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Http { status } => *status >= 500,
            _ => false,
        }
    }

    /// Transport-level failure: no HTTP response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_) | Self::Other(_))
    }

    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            Self::Body(error.to_string())
        } else {
            Self::Other(error.to_string())
        }
    }
}

/// Result of fetching one URL
#[derive(Debug, Clone)]
pub struct PageFetchResult {
    /// The normalized URL that was requested
    pub url: Url,

    /// URL after redirects, restored from the cache on a hit
    pub final_url: Url,

    /// HTTP status, when a response was received
    pub status_code: Option<u16>,

    pub body: String,

    /// Response headers with lowercased names
    pub headers: HashMap<String, String>,

    pub load_time: Duration,

    /// Set when the page could not be fetched or returned an error status
    pub error: Option<FetchError>,

    /// True when served from the cache without a network call
    pub from_cache: bool,

    pub fetched_at: DateTime<Utc>,
}

impl PageFetchResult {
    /// A fetch that produced no usable response
    pub fn failed(url: &Url, error: FetchError, status_code: Option<u16>) -> Self {
        Self {
            url: url.clone(),
            final_url: url.clone(),
            status_code,
            body: String::new(),
            headers: HashMap::new(),
            load_time: Duration::ZERO,
            error: Some(error),
            from_cache: false,
            fetched_at: Utc::now(),
        }
    }

    fn from_cache_record(url: &Url, record: CacheRecord) -> Self {
        let mut headers = HashMap::new();
        if let Some(content_type) = record.content_type {
            headers.insert("content-type".to_string(), content_type);
        }
        let final_url = Url::parse(&record.final_url).unwrap_or_else(|_| url.clone());

        Self {
            url: url.clone(),
            final_url,
            status_code: Some(record.status_code),
            body: record.body,
            headers,
            load_time: record.load_time,
            error: None,
            from_cache: true,
            fetched_at: record.fetched_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status_code.map_or(false, |s| (200..300).contains(&s))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Builds the HTTP client shared by every job
///
/// # Arguments
///
/// * `fetcher` - Timeouts for every request
/// * `user_agent` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    fetcher: &FetcherConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(fetcher.timeout())
        .connect_timeout(Duration::from_secs(fetcher.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A successful network response, before cache write-back
struct Response {
    final_url: Url,
    status_code: u16,
    headers: HashMap<String, String>,
    body: String,
    load_time: Duration,
}

/// Flattens response headers into a map keyed by lowercased name
///
/// A repeated header keeps its first value, matching what
/// `HeaderMap::get` returns.
fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            map.entry(name.as_str().to_lowercase())
                .or_insert_with(|| value.to_string());
        }
    }
    map
}

/// Fetcher owned by one job
///
/// The HTTP client and cache store are shared across jobs; the politeness
/// state is per job.
pub struct Fetcher {
    client: Client,
    cache: Arc<dyn CacheStore>,
    use_cache: bool,
    max_age: chrono::Duration,
    max_retries: usize,
    retry_base_delay_ms: u64,
    politeness_delay: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        client: Client,
        cache: Arc<dyn CacheStore>,
        fetcher_config: &FetcherConfig,
        cache_config: &CacheConfig,
        use_cache: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            cache,
            use_cache,
            max_age: cache_config.max_age(),
            max_retries: fetcher_config.max_retries,
            retry_base_delay_ms: fetcher_config.retry_base_delay_ms,
            politeness_delay: fetcher_config.politeness_delay(),
            hosts: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    /// Applies a robots.txt crawl delay to every later request to `host`
    pub fn set_crawl_delay(&self, host: &str, delay: Duration) {
        if let Ok(mut hosts) = self.hosts.lock() {
            hosts.entry(host.to_string()).or_default().crawl_delay = Some(delay);
        }
    }

    /// Number of network requests issued to `host` so far
    pub fn request_count(&self, host: &str) -> u32 {
        self.hosts
            .lock()
            .ok()
            .and_then(|hosts| hosts.get(host).map(|h| h.request_count))
            .unwrap_or(0)
    }

    /// Fetches a page, serving it from the cache when allowed
    ///
    /// # Request Flow
    ///
    /// 1. If the job uses the cache and a fresh record exists, return it
    /// 2. Otherwise issue a GET, retrying transient failures with backoff
    /// 3. Write 2xx responses back to the cache
    ///
    /// Cache medium failures are logged and treated as a miss.
    pub async fn fetch(&self, url: &Url) -> PageFetchResult {
        if self.use_cache {
            match self.cache.get(url.as_str()) {
                Ok(Some(record)) if !record.is_stale(Utc::now(), self.max_age) => {
                    trace!("Cache hit: {}", url);
                    return PageFetchResult::from_cache_record(url, record);
                }
                Ok(Some(_)) => debug!("Cache record stale: {}", url),
                Ok(None) => {}
                Err(e) => warn!("Cache read failed for {}, fetching uncached: {}", url, e),
            }
        }

        let result = self.fetch_network(url).await;

        if result.is_success() {
            let record = CacheRecord::new(
                url.as_str(),
                result.body.clone(),
                result.status_code.unwrap_or(200),
                result.content_type().map(str::to_string),
                result.load_time,
            )
            .with_final_url(result.final_url.as_str());
            if let Err(e) = self.cache.put(&record) {
                warn!("Cache write failed for {}: {}", url, e);
            }
        }

        result
    }

    /// Fetches a URL over the network without touching the cache
    ///
    /// Used for robots.txt and sitemaps, which must always be current.
    pub async fn fetch_uncached(&self, url: &Url) -> PageFetchResult {
        self.fetch_network(url).await
    }

    async fn fetch_network(&self, url: &Url) -> PageFetchResult {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor((self.retry_base_delay_ms / 2).max(1))
            .max_delay(MAX_RETRY_DELAY)
            .take(self.max_retries);

        let mut attempt = 0u32;
        let outcome = RetryIf::start(
            strategy,
            || {
                attempt += 1;
                if attempt > 1 {
                    debug!("Retrying {} (attempt {})", url, attempt);
                }
                self.attempt(url)
            },
            |e: &FetchError| e.is_transient() && !self.cancel.is_cancelled(),
        )
        .await;

        match outcome {
            Ok(response) => {
                let error = if response.status_code >= 400 {
                    Some(FetchError::Http {
                        status: response.status_code,
                    })
                } else {
                    None
                };

                PageFetchResult {
                    url: url.clone(),
                    final_url: response.final_url,
                    status_code: Some(response.status_code),
                    body: response.body,
                    headers: response.headers,
                    load_time: response.load_time,
                    error,
                    from_cache: false,
                    fetched_at: Utc::now(),
                }
            }
            Err(error) => {
                let status_code = match &error {
                    FetchError::Http { status } => Some(*status),
                    _ => None,
                };
                warn!("Fetch failed for {}: {}", url, error);
                PageFetchResult::failed(url, error, status_code)
            }
        }
    }

    /// One network attempt: wait for the host slot, then GET
    ///
    /// 5xx responses come back as `Err` so the retry policy sees them; 4xx
    /// responses are returned as `Ok` and never retried.
    async fn attempt(&self, url: &Url) -> Result<Response, FetchError> {
        self.wait_for_host(url).await?;

        let start = Instant::now();
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            sent = self.client.get(url.as_str()).send() => {
                sent.map_err(|e| FetchError::from_reqwest(&e))?
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let headers = collect_headers(response.headers());

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        Ok(Response {
            final_url,
            status_code: status.as_u16(),
            headers,
            body,
            load_time: start.elapsed(),
        })
    }

    /// Sleeps until this job may send the next request to the URL's host
    async fn wait_for_host(&self, url: &Url) -> Result<(), FetchError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let wait = match self.hosts.lock() {
            Ok(mut hosts) => hosts
                .entry(host)
                .or_default()
                .reserve_slot(Instant::now(), self.politeness_delay),
            Err(_) => self.politeness_delay,
        };

        if wait.is_zero() {
            return Ok(());
        }

        trace!("Politeness wait of {:?} before {}", wait, url);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(wait) => Ok(()),
        }
    }
}
