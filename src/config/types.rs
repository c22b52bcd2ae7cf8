use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration shared by every audit job
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    #[serde(default)]
    pub fetcher: FetcherConfig,

    #[serde(default)]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    /// Submission rate limiting; absent means unlimited
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetcherConfig {
    /// Total request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: usize,

    /// First backoff delay; doubles on every retry (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Minimum spacing between two requests to the same host (milliseconds)
    pub politeness_delay_ms: u64,
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 2,
            retry_base_delay_ms: 500,
            politeness_delay_ms: 500,
        }
    }
}

/// User agent identification
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    pub crawler_name: String,
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SeoAuditBot".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

/// Page cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    /// Path to the SQLite cache database
    pub database_path: String,

    /// Records older than this are stale and get re-fetched
    pub max_age_hours: i64,

    /// Records older than this are purged when the engine starts
    pub cleanup_days: i64,
}

impl CacheConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_age_hours)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: "./seo_cache.db".to_string(),
            max_age_hours: 24,
            cleanup_days: 7,
        }
    }
}

/// Bounds applied to every submitted job
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LimitsConfig {
    pub default_max_pages: usize,

    /// Largest `max_pages` a caller may request outside whole-site mode
    pub max_pages_limit: usize,

    /// Hard cap on pages visited in whole-site mode
    pub whole_site_ceiling: usize,

    pub default_concurrency: usize,
    pub max_concurrency: usize,

    /// Link depth followed from the root page
    pub max_depth: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_max_pages: 10,
            max_pages_limit: 100,
            whole_site_ceiling: 1000,
            default_concurrency: 3,
            max_concurrency: 10,
            max_depth: 3,
        }
    }
}

/// Process-wide limit on accepted job submissions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub max_submissions: usize,
    pub window_secs: u64,
}

/// Per-job settings, supplied with each submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Page cap; ignored in whole-site mode
    pub max_pages: usize,

    /// Crawl until the frontier is exhausted (bounded by the safety ceiling)
    pub whole_site: bool,

    /// Concurrent fetches for this job
    pub concurrency: usize,

    /// Serve fresh cache records without a network call
    pub use_cache: bool,

    /// Honor robots.txt disallow rules
    pub respect_robots: bool,

    pub max_depth: u32,
}

impl JobConfig {
    /// Builds a job configuration from the engine defaults
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            max_pages: limits.default_max_pages,
            whole_site: false,
            concurrency: limits.default_concurrency,
            use_cache: true,
            respect_robots: true,
            max_depth: limits.max_depth,
        }
    }

    /// The number of pages this job may visit
    pub fn page_cap(&self, limits: &LimitsConfig) -> usize {
        if self.whole_site {
            limits.whole_site_ceiling
        } else {
            self.max_pages.min(limits.whole_site_ceiling)
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}
