//! Page Analyzer
//!
//! Turns a fetched page into a `PageResult` and a job's page results into an
//! `AnalysisResult`. Analysis is a pure function of the fetched content, so
//! a page served from the cache yields exactly the result its original fetch
//! did.

pub mod metrics;
pub mod rules;
pub mod scoring;

pub use metrics::{Headings, LinkCounts, PageMetrics};
pub use scoring::{aggregate, overall_score, page_score};

use crate::crawler::PageFetchResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an SEO issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Points deducted from the page score
    pub fn penalty(&self) -> u32 {
        match self {
            Self::Critical => 20,
            Self::High => 10,
            Self::Medium => 5,
            Self::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One rule violation on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,

    /// Stable machine-readable rule code, e.g. `missing_title`
    pub code: String,

    pub message: String,
}

impl Issue {
    pub fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Analysis of one fetched (or unfetchable) URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub word_count: usize,
    pub headings: Headings,
    pub links: LinkCounts,
    pub load_time_ms: u64,
    pub issues: Vec<Issue>,

    /// 0 to 100
    pub page_score: u8,

    /// Link distance from the root page
    pub depth: u32,

    /// Fetch failure description, when the page could not be analyzed
    pub fetch_error: Option<String>,

    pub metrics: PageMetrics,
}

/// Issue totals across every page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Counters describing how a crawl went
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub pages_from_cache: usize,
    pub pages_failed: usize,
    pub sitemap_urls: usize,
    pub discovered_urls: usize,
    pub total_bytes: usize,
    pub average_load_time_ms: u64,
    pub duration_ms: u64,
}

/// One result from an external search-results lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerpEntry {
    pub position: u32,
    pub url: String,
    pub title: String,
}

/// Search-results comparison supplied by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerpComparison {
    pub keyword: String,

    /// Where the audited site ranks, if it appears at all
    pub target_position: Option<u32>,

    pub competitors: Vec<SerpEntry>,
}

/// Aggregate report for a completed audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub target: String,
    pub keyword: Option<String>,

    /// Sorted by URL, one entry per normalized URL
    pub pages: Vec<PageResult>,

    pub overall_score: f64,
    pub severity_counts: SeverityCounts,
    pub stats: CrawlStats,
    pub serp: Option<SerpComparison>,
    pub completed_at: DateTime<Utc>,
}

/// Analyzes one fetched page
///
/// Pages that failed to fetch or answered with an error status get a single
/// critical fetch issue (plus the HTTPS rule) instead of content rules.
///
/// # Arguments
///
/// * `fetch` - The fetch result for the page
/// * `keyword` - Optional target keyword for relevance rules
///
/// # Returns
///
/// The page result with `depth` left at 0; the caller sets it from the
/// frontier entry.
pub fn analyze(fetch: &PageFetchResult, keyword: Option<&str>) -> PageResult {
    let url = &fetch.url;
    let mut result = PageResult {
        url: url.to_string(),
        status_code: fetch.status_code,
        load_time_ms: fetch.load_time.as_millis() as u64,
        ..PageResult::default()
    };

    if let Some(error) = &fetch.error {
        result.issues = rules::fetch_issues(url, fetch.status_code, error);
        result.fetch_error = Some(error.to_string());
        result.page_score = page_score(&result.issues);
        return result;
    }

    let extracted = metrics::extract(&fetch.body, &fetch.final_url, keyword);
    result.issues = rules::content_issues(url, &extracted, keyword);
    result
        .issues
        .extend(rules::performance_issues(fetch.load_time));
    result.page_score = page_score(&result.issues);
    result.title = extracted.title;
    result.meta_description = extracted.meta_description;
    result.word_count = extracted.word_count;
    result.headings = extracted.headings;
    result.links = extracted.links;
    result.metrics = extracted.metrics;
    result
}
