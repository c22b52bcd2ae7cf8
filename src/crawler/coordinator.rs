//! Crawl coordinator - drives one audit job
//!
//! This module contains the crawl loop for a single job:
//! - Fetching the root page, robots.txt and sitemaps (discovering)
//! - Running a bounded worker pool over the frontier (crawling)
//! - Aggregating page results into the analysis result (scoring)
//! - Cooperative cancellation and monotonic progress reporting

use crate::analyzer::{self, AnalysisResult, CrawlStats, PageResult};
use crate::cache::CacheStore;
use crate::config::{EngineConfig, JobConfig};
use crate::crawler::fetcher::{FetchError, Fetcher, PageFetchResult};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::parser::extract_links;
use crate::state::CrawlPhase;
use crate::AuditError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Progress of a running crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Pages finished so far
    pub current_step: usize,

    /// Current estimate of the pages this job will visit
    pub total_steps: usize,

    /// 0.0 to 100.0, never decreasing within a job
    pub percentage: f64,
}

/// Receives progress events from a coordinator
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: Progress);

    fn on_phase(&self, _phase: CrawlPhase) {}
}

/// Progress sink that discards every event
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _progress: Progress) {}
}

/// Turns raw counts into progress values whose percentage never goes down
///
/// The total is re-estimated as the frontier grows, so a raw ratio can fall;
/// the tracker holds the highest percentage reported so far.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last_percentage: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, done: usize, estimated_total: usize) -> Progress {
        let total = estimated_total.max(done).max(1);
        let raw = (done as f64 / total as f64 * 100.0).min(100.0);
        self.last_percentage = self.last_percentage.max(raw);

        Progress {
            current_step: done,
            total_steps: total,
            percentage: (self.last_percentage * 10.0).round() / 10.0,
        }
    }

    pub fn finish(&mut self, done: usize) -> Progress {
        self.last_percentage = 100.0;
        Progress {
            current_step: done,
            total_steps: done.max(1),
            percentage: 100.0,
        }
    }
}

/// Resources shared by every job in the process
#[derive(Clone)]
pub struct CrawlContext {
    pub engine: Arc<EngineConfig>,
    pub client: Client,
    pub cache: Arc<dyn CacheStore>,
}

/// How a crawl ended, when it did not fail
#[derive(Debug)]
pub enum CrawlOutcome {
    Completed(AnalysisResult),

    /// Cancelled before scoring; holds the pages finished by then
    Cancelled { partial: Vec<PageResult> },
}

/// What a worker hands back for one URL
struct PageOutcome {
    entry: FrontierEntry,
    page: PageResult,
    links: Vec<Url>,
    from_cache: bool,
    bytes: usize,
}

/// Running totals for `CrawlStats`
#[derive(Default)]
struct Counters {
    fetched: usize,
    from_cache: usize,
    failed: usize,
    bytes: usize,
    load_time_ms: u64,
}

/// Coordinator for one audit job
pub struct Coordinator {
    target: Url,
    keyword: Option<String>,
    concurrency: usize,
    fetcher: Arc<Fetcher>,
    cache: Arc<dyn CacheStore>,
    frontier: Frontier,
    cancel: CancellationToken,
    sink: Arc<dyn ProgressSink>,
    tracker: ProgressTracker,
    phase: CrawlPhase,
    results: Vec<PageResult>,
    counters: Counters,
}

impl Coordinator {
    /// Creates a coordinator for one job
    ///
    /// # Arguments
    ///
    /// * `target` - The normalized root URL
    /// * `keyword` - Optional target keyword
    /// * `job` - The validated job configuration
    /// * `context` - Shared HTTP client, cache and engine configuration
    /// * `cancel` - Token checked at every loop boundary
    /// * `sink` - Receives progress and phase events
    pub fn new(
        target: Url,
        keyword: Option<String>,
        job: &JobConfig,
        context: &CrawlContext,
        cancel: CancellationToken,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let engine = &context.engine;
        let fetcher = Fetcher::new(
            context.client.clone(),
            context.cache.clone(),
            &engine.fetcher,
            &engine.cache,
            job.use_cache,
            cancel.clone(),
        );

        let mut frontier = Frontier::new(
            target.clone(),
            job.page_cap(&engine.limits),
            job.max_depth,
            job.respect_robots,
            &engine.user_agent.crawler_name,
        );
        frontier.seed(&target);

        Self {
            target,
            keyword,
            concurrency: job.concurrency.max(1),
            fetcher: Arc::new(fetcher),
            cache: context.cache.clone(),
            frontier,
            cancel,
            sink,
            tracker: ProgressTracker::new(),
            phase: CrawlPhase::Init,
            results: Vec::new(),
            counters: Counters::default(),
        }
    }

    fn transition(&mut self, next: CrawlPhase) {
        if !self.phase.can_transition_to(next) {
            warn!("Ignoring crawl phase change {} -> {}", self.phase, next);
            return;
        }
        debug!("Crawl of {}: {} -> {}", self.target, self.phase, next);
        self.phase = next;
        self.sink.on_phase(next);
    }

    /// Runs the crawl to completion, cancellation or failure
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome::Completed)` - The analysis result
    /// * `Ok(CrawlOutcome::Cancelled)` - Cancelled; partial pages attached
    /// * `Err(AuditError::Frontier)` - The root URL could not be reached
    pub async fn run(mut self) -> Result<CrawlOutcome, AuditError> {
        let started = Instant::now();
        info!("Starting crawl of {}", self.target);

        self.transition(CrawlPhase::Discovering);
        if !self.discover().await? {
            return Ok(self.cancelled());
        }

        self.transition(CrawlPhase::Crawling);
        self.crawl().await;

        if self.cancel.is_cancelled() {
            return Ok(self.cancelled());
        }

        self.transition(CrawlPhase::Scoring);
        let stats = self.stats(started);
        let done = self.results.len();
        let result = analyzer::aggregate(
            self.target.as_str(),
            self.keyword.as_deref(),
            std::mem::take(&mut self.results),
            stats,
        );

        self.sink.on_progress(self.tracker.finish(done));
        self.transition(CrawlPhase::Done);
        info!(
            "Crawl of {} complete: {} pages, {} requests, overall score {}",
            self.target,
            result.pages.len(),
            self.fetcher.request_count(self.target.host_str().unwrap_or_default()),
            result.overall_score
        );

        Ok(CrawlOutcome::Completed(result))
    }

    fn cancelled(mut self) -> CrawlOutcome {
        self.transition(CrawlPhase::Cancelled);
        info!(
            "Crawl of {} cancelled after {} pages",
            self.target,
            self.results.len()
        );
        CrawlOutcome::Cancelled {
            partial: self.results,
        }
    }

    /// Fetches the root page, then loads robots.txt and sitemaps
    ///
    /// Sitemap URLs are admitted before the root page's links so they are
    /// crawled first. Returns `false` when the job was cancelled meanwhile.
    async fn discover(&mut self) -> Result<bool, AuditError> {
        let Some(root) = self.frontier.next() else {
            return Err(AuditError::Frontier(format!(
                "Frontier for {} has no root entry",
                self.target
            )));
        };
        self.frontier.mark_visited(&root.url);

        let fetch = self.fetcher.fetch(&root.url).await;
        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        if let Some(error) = &fetch.error {
            if error.is_transport() {
                error!("Root URL {} unreachable: {}", root.url, error);
                return Err(AuditError::Frontier(format!(
                    "Root URL {} is unreachable: {}",
                    root.url, error
                )));
            }
        }

        let outcome = process_page(root, fetch, self.keyword.as_deref(), self.cache.as_ref());
        let root_url = outcome.entry.url.clone();
        let root_links = outcome.links.clone();
        self.record(outcome);

        self.frontier.load_robots(&self.fetcher).await;
        let from_sitemaps = self.frontier.load_sitemaps(&self.fetcher).await;
        let from_page = self.frontier.discover(&root_url, 0, &root_links).len();
        debug!(
            "Discovery for {}: {} URLs from sitemaps, {} from the root page",
            self.target, from_sitemaps, from_page
        );

        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        self.emit_progress();
        Ok(true)
    }

    /// Drains the frontier with at most `concurrency` fetches in flight
    ///
    /// Returns when the frontier is exhausted, the page cap is reached or the
    /// job is cancelled. On cancellation, fetches already in flight are
    /// allowed to finish.
    async fn crawl(&mut self) {
        let mut in_flight: JoinSet<Option<PageOutcome>> = JoinSet::new();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            while in_flight.len() < self.concurrency {
                let Some(entry) = self.frontier.next() else {
                    break;
                };
                self.frontier.mark_visited(&entry.url);
                self.spawn_worker(&mut in_flight, entry);
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                joined = in_flight.join_next() => {
                    if let Some(joined) = joined {
                        self.handle_joined(joined);
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            self.handle_joined(joined);
        }
    }

    fn spawn_worker(&self, tasks: &mut JoinSet<Option<PageOutcome>>, entry: FrontierEntry) {
        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let keyword = self.keyword.clone();

        tasks.spawn(async move {
            let fetch = fetcher.fetch(&entry.url).await;
            if fetch.error == Some(FetchError::Cancelled) {
                return None;
            }
            Some(process_page(entry, fetch, keyword.as_deref(), cache.as_ref()))
        });
    }

    fn handle_joined(&mut self, joined: Result<Option<PageOutcome>, tokio::task::JoinError>) {
        match joined {
            Ok(Some(outcome)) => {
                let parent = outcome.entry.url.clone();
                let depth = outcome.entry.depth;
                let links = outcome.links.clone();
                self.record(outcome);
                if !self.cancel.is_cancelled() {
                    self.frontier.discover(&parent, depth, &links);
                }
                self.emit_progress();
            }
            Ok(None) => {}
            Err(e) => error!("Crawl worker failed: {}", e),
        }
    }

    /// Appends a finished page in completion order
    fn record(&mut self, outcome: PageOutcome) {
        let counters = &mut self.counters;
        if outcome.page.fetch_error.is_some() {
            counters.failed += 1;
        } else if outcome.from_cache {
            counters.from_cache += 1;
        } else {
            counters.fetched += 1;
        }
        counters.bytes += outcome.bytes;
        counters.load_time_ms += outcome.page.load_time_ms;

        debug!(
            "Analyzed {} (depth {}, score {})",
            outcome.page.url, outcome.entry.depth, outcome.page.page_score
        );
        self.results.push(outcome.page);
    }

    fn emit_progress(&mut self) {
        let progress = self
            .tracker
            .update(self.results.len(), self.frontier.estimated_total());
        self.sink.on_progress(progress);
    }

    fn stats(&self, started: Instant) -> CrawlStats {
        let pages = self.results.len();
        CrawlStats {
            pages_fetched: self.counters.fetched,
            pages_from_cache: self.counters.from_cache,
            pages_failed: self.counters.failed,
            sitemap_urls: self.frontier.sitemap_url_count(),
            discovered_urls: self.frontier.discovered_count(),
            total_bytes: self.counters.bytes,
            average_load_time_ms: if pages == 0 {
                0
            } else {
                self.counters.load_time_ms / pages as u64
            },
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Analyzes a fetched page and extracts its links
///
/// Fresh network fetches get their metrics written next to the cached body.
fn process_page(
    entry: FrontierEntry,
    fetch: PageFetchResult,
    keyword: Option<&str>,
    cache: &dyn CacheStore,
) -> PageOutcome {
    let mut page = analyzer::analyze(&fetch, keyword);
    page.depth = entry.depth;

    let is_html = fetch
        .content_type()
        .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"));
    let links = if fetch.is_success() && is_html {
        extract_links(&fetch.body, &fetch.final_url)
    } else {
        Vec::new()
    };

    if fetch.is_success() && !fetch.from_cache {
        match serde_json::to_string(&page.metrics) {
            Ok(json) => {
                if let Err(e) = cache.set_metrics(fetch.url.as_str(), &json) {
                    warn!("Failed to cache metrics for {}: {}", fetch.url, e);
                }
            }
            Err(e) => warn!("Failed to serialize metrics for {}: {}", fetch.url, e),
        }
    }

    PageOutcome {
        entry,
        page,
        links,
        from_cache: fetch.from_cache,
        bytes: fetch.body.len(),
    }
}
