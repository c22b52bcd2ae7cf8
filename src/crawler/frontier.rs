//! Per-job URL frontier
//!
//! Holds the breadth-first queue of discovered-but-unfetched URLs and the set
//! of every URL ever admitted. Admission normalizes the URL, keeps it on the
//! audited site, applies the depth bound and (when enabled) robots.txt rules.

use crate::crawler::fetcher::Fetcher;
use crate::robots::{
    parse_sitemap, robots_url, well_known_sitemap_urls, RobotsRules, SitemapDocument,
};
use crate::url::{is_same_site, normalize_url};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound on URLs taken from sitemaps for one job
const MAX_SITEMAP_URLS: usize = 5_000;

/// Upper bound on nested sitemaps followed from a sitemap index
const MAX_NESTED_SITEMAPS: usize = 50;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,

    /// Link distance from the root page (root is 0, sitemap entries are 1)
    pub depth: u32,

    /// Page or sitemap the URL was found on; `None` for the root
    pub discovered_from: Option<Url>,
}

/// Frontier for one audit job
///
/// Owned exclusively by the job's coordinator.
pub struct Frontier {
    root: Url,
    queue: VecDeque<FrontierEntry>,

    /// Every admitted URL, queued or visited
    seen: HashSet<String>,
    visited: HashSet<String>,

    page_cap: usize,
    max_depth: u32,
    respect_robots: bool,
    robots: RobotsRules,
    robots_agent: String,
    sitemap_urls: usize,
}

impl Frontier {
    /// Creates an empty frontier scoped to the site of `root`
    ///
    /// # Arguments
    ///
    /// * `root` - The normalized root URL
    /// * `page_cap` - Maximum number of pages handed out by `next`
    /// * `max_depth` - Deepest link distance admitted
    /// * `respect_robots` - Whether robots.txt rules filter admission
    /// * `robots_agent` - Product token matched against robots.txt groups
    pub fn new(
        root: Url,
        page_cap: usize,
        max_depth: u32,
        respect_robots: bool,
        robots_agent: &str,
    ) -> Self {
        Self {
            root,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            visited: HashSet::new(),
            page_cap,
            max_depth,
            respect_robots,
            robots: RobotsRules::allow_all(),
            robots_agent: robots_agent.to_string(),
            sitemap_urls: 0,
        }
    }

    /// Queues the root URL at depth 0
    pub fn seed(&mut self, root: &Url) {
        if self.seen.insert(root.as_str().to_string()) {
            self.queue.push_back(FrontierEntry {
                url: root.clone(),
                depth: 0,
                discovered_from: None,
            });
        }
    }

    /// Admits links found on `parent`, returning the URLs newly queued
    ///
    /// Links are normalized, then dropped if already seen, off-site, deeper
    /// than the depth bound or disallowed by robots.txt.
    pub fn discover(&mut self, parent: &Url, parent_depth: u32, links: &[Url]) -> Vec<Url> {
        let depth = parent_depth + 1;
        if depth > self.max_depth {
            return Vec::new();
        }

        let mut admitted = Vec::new();
        for link in links {
            let Ok(url) = normalize_url(link.as_str()) else {
                continue;
            };
            if self.admit(&url, depth, Some(parent)) {
                admitted.push(url);
            }
        }

        if !admitted.is_empty() {
            debug!("Admitted {} new URLs from {}", admitted.len(), parent);
        }
        admitted
    }

    fn admit(&mut self, url: &Url, depth: u32, parent: Option<&Url>) -> bool {
        if self.seen.contains(url.as_str()) || !is_same_site(&self.root, url) {
            return false;
        }

        if self.respect_robots && !self.robots.is_allowed(url.as_str(), &self.robots_agent) {
            debug!("Disallowed by robots.txt: {}", url);
            return false;
        }

        self.seen.insert(url.as_str().to_string());
        self.queue.push_back(FrontierEntry {
            url: url.clone(),
            depth,
            discovered_from: parent.cloned(),
        });
        true
    }

    /// Pops the next unvisited URL in breadth-first order
    ///
    /// Returns `None` when the queue is empty or the page cap is reached.
    pub fn next(&mut self) -> Option<FrontierEntry> {
        if self.is_capped() {
            return None;
        }

        while let Some(entry) = self.queue.pop_front() {
            if !self.visited.contains(entry.url.as_str()) {
                return Some(entry);
            }
        }
        None
    }

    /// Records that a URL has been handed to a worker
    pub fn mark_visited(&mut self, url: &Url) {
        self.seen.insert(url.as_str().to_string());
        self.visited.insert(url.as_str().to_string());
    }

    pub fn is_capped(&self) -> bool {
        self.visited.len() >= self.page_cap
    }

    /// Every URL ever admitted, including the root
    pub fn discovered_count(&self) -> usize {
        self.seen.len()
    }

    pub fn sitemap_url_count(&self) -> usize {
        self.sitemap_urls
    }

    /// Current guess at the total number of pages this job will visit
    pub fn estimated_total(&self) -> usize {
        (self.visited.len() + self.queue.len()).min(self.page_cap).max(1)
    }

    /// Replaces the robots.txt rules used for admission
    pub fn set_robots(&mut self, robots: RobotsRules) {
        self.robots = robots;
    }

    /// Fetches and installs the site's robots.txt
    ///
    /// A missing or unreachable robots.txt allows everything. A crawl delay
    /// is passed on to the fetcher's politeness gate when robots handling is
    /// enabled.
    pub async fn load_robots(&mut self, fetcher: &Fetcher) {
        let Some(robots_url) = robots_url(&self.root) else {
            return;
        };

        let result = fetcher.fetch_uncached(&robots_url).await;
        let robots = if result.is_success() {
            RobotsRules::from_content(&result.body)
        } else {
            debug!(
                "No usable robots.txt at {} (status {:?})",
                robots_url, result.status_code
            );
            RobotsRules::allow_all()
        };

        if self.respect_robots {
            if let (Some(delay), Some(host)) =
                (robots.crawl_delay(&self.robots_agent), self.root.host_str())
            {
                info!("Honoring robots.txt crawl delay of {:?} for {}", delay, host);
                fetcher.set_crawl_delay(host, delay);
            }
        }

        self.set_robots(robots);
    }

    /// Fetches the site's sitemaps and admits their URLs at depth 1
    ///
    /// Sitemaps declared in robots.txt are used when present, otherwise every
    /// well-known location (`/sitemap.xml`, `/sitemap_index.xml`,
    /// `/sitemaps.xml`, `/sitemap.txt`) is tried. Sitemap indexes are
    /// followed one level deep. Unreachable or malformed sitemaps are skipped.
    ///
    /// # Returns
    ///
    /// The number of URLs admitted from sitemaps
    pub async fn load_sitemaps(&mut self, fetcher: &Fetcher) -> usize {
        let mut sitemaps: Vec<Url> = self
            .robots
            .sitemaps()
            .iter()
            .filter_map(|s| Url::parse(s).ok())
            .collect();
        if sitemaps.is_empty() {
            sitemaps = well_known_sitemap_urls(&self.root);
        }

        // (sitemap the entry was listed in, raw entry)
        let mut page_urls: Vec<(Url, String)> = Vec::new();
        for sitemap in &sitemaps {
            match fetch_sitemap(fetcher, sitemap).await {
                Some(SitemapDocument::UrlSet(urls)) => {
                    page_urls.extend(urls.into_iter().map(|u| (sitemap.clone(), u)));
                }
                Some(SitemapDocument::Index(nested)) => {
                    for nested_url in nested
                        .iter()
                        .filter_map(|s| Url::parse(s).ok())
                        .take(MAX_NESTED_SITEMAPS)
                    {
                        if let Some(SitemapDocument::UrlSet(urls)) =
                            fetch_sitemap(fetcher, &nested_url).await
                        {
                            page_urls.extend(urls.into_iter().map(|u| (nested_url.clone(), u)));
                        }
                        if page_urls.len() >= MAX_SITEMAP_URLS {
                            break;
                        }
                    }
                }
                None => {}
            }
            if page_urls.len() >= MAX_SITEMAP_URLS {
                break;
            }
        }

        if self.max_depth == 0 {
            return 0;
        }

        let mut admitted = 0;
        for (source, raw) in page_urls.iter().take(MAX_SITEMAP_URLS) {
            let Ok(url) = normalize_url(raw) else {
                continue;
            };
            if self.admit(&url, 1, Some(source)) {
                admitted += 1;
            }
        }

        self.sitemap_urls = admitted;
        if admitted > 0 {
            info!("Admitted {} URLs from sitemaps", admitted);
        }
        admitted
    }
}

async fn fetch_sitemap(fetcher: &Fetcher, url: &Url) -> Option<SitemapDocument> {
    let result = fetcher.fetch_uncached(url).await;
    if !result.is_success() {
        debug!("Sitemap unavailable at {} (status {:?})", url, result.status_code);
        return None;
    }

    match parse_sitemap(&result.body) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("Skipping malformed sitemap {}: {}", url, e);
            None
        }
    }
}
