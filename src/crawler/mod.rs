//! Crawler module for fetching and walking a site
//!
//! This module contains the audit engine's crawling logic, including:
//! - HTTP fetching with caching, retry and politeness
//! - HTML link extraction
//! - The per-job URL frontier
//! - The crawl coordinator that drives a job from root page to report

mod coordinator;
mod fetcher;
mod frontier;
mod parser;

pub use coordinator::{
    CrawlContext, CrawlOutcome, Coordinator, NoopProgress, Progress, ProgressSink,
    ProgressTracker,
};
pub use fetcher::{build_http_client, FetchError, Fetcher, PageFetchResult};
pub use frontier::{Frontier, FrontierEntry};
pub use parser::extract_links;
