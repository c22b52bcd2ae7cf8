//! Integration tests for the audit engine
//!
//! These tests use wiremock to create mock HTTP servers and drive whole
//! audits end-to-end through the crawler and the job orchestrator.

mod cache_tests;
mod crawl_tests;
mod job_tests;

use seo_audit::cache::{CacheStore, SqliteCacheStore};
use seo_audit::jobs::{JobId, JobOrchestrator, JobStatusView};
use seo_audit::{EngineConfig, JobConfig};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Engine configuration tuned for fast tests
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.fetcher.timeout_secs = 5;
    config.fetcher.connect_timeout_secs = 2;
    config.fetcher.max_retries = 2;
    config.fetcher.retry_base_delay_ms = 10;
    config.fetcher.politeness_delay_ms = 0;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.user_agent.crawler_version = "1.0.0".to_string();
    config
}

pub fn job_config(max_pages: usize) -> JobConfig {
    JobConfig {
        max_pages,
        concurrency: 2,
        ..JobConfig::default()
    }
}

pub fn in_memory_cache() -> Arc<dyn CacheStore> {
    Arc::new(SqliteCacheStore::new_in_memory().expect("Failed to open in-memory cache"))
}

pub fn orchestrator(config: EngineConfig) -> JobOrchestrator {
    JobOrchestrator::new(config, in_memory_cache()).expect("Failed to build orchestrator")
}

/// An HTML page linking to each of `links` (paths relative to the site root)
pub fn html_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!(
        r#"<!DOCTYPE html><html lang="en"><head><title>{}</title></head>
<body><h1>{}</h1><p>Some text about widgets.</p>{}</body></html>"#,
        title, title, anchors
    )
}

/// A 200 response carrying `body` with a single HTML Content-Type
pub fn html_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

/// Mounts a GET handler serving `body` as HTML at `page_path`
pub async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html_response(body))
        .mount(server)
        .await;
}

/// Normalized form of a mock server path, as it appears in page results
pub fn page_url(server: &MockServer, page_path: &str) -> String {
    format!("{}{}", server.uri(), page_path)
}

/// Polls a job until it reaches a terminal status
pub async fn wait_for_terminal(orchestrator: &JobOrchestrator, id: &JobId) -> JobStatusView {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    loop {
        let status = orchestrator.status(id).expect("Job should exist");
        if status.status.is_terminal() {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Job {} did not finish in time (status {})",
            id,
            status.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Number of requests the server received for `request_path`
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
