//! Cache behaviour across jobs

use crate::{html_page, job_config, mount_page, page_url, request_count, test_config, wait_for_terminal};
use chrono::Utc;
use seo_audit::cache::{open_cache, CacheRecord, CacheStore};
use seo_audit::jobs::{JobOrchestrator, JobStatus};
use seo_audit::AnalysisResult;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run_to_completion(orchestrator: &JobOrchestrator, target: &str, use_cache: bool) -> AnalysisResult {
    let job = seo_audit::JobConfig {
        use_cache,
        ..job_config(10)
    };
    let submission = orchestrator.submit(target, None, job).unwrap();
    let status = wait_for_terminal(orchestrator, &submission.id).await;
    assert_eq!(status.status, JobStatus::Completed);
    orchestrator.report(&submission.id).unwrap()
}

async fn two_page_site() -> MockServer {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/about"])).await;
    mount_page(&server, "/about", html_page("About", &[])).await;
    server
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let server = two_page_site().await;
    let temp_dir = TempDir::new().unwrap();
    let cache: Arc<dyn CacheStore> = Arc::new(open_cache(&temp_dir.path().join("cache.db")).unwrap());
    let orchestrator = JobOrchestrator::new(test_config(), cache).unwrap();

    let first = run_to_completion(&orchestrator, &server.uri(), true).await;
    assert_eq!(request_count(&server, "/").await, 1);
    assert_eq!(request_count(&server, "/about").await, 1);

    let second = run_to_completion(&orchestrator, &server.uri(), true).await;
    assert_eq!(request_count(&server, "/").await, 1);
    assert_eq!(request_count(&server, "/about").await, 1);

    assert_eq!(first.pages, second.pages);
    assert_eq!(second.stats.pages_from_cache, 2);
    assert_eq!(second.stats.pages_fetched, 0);
}

#[tokio::test]
async fn test_cache_disabled_refetches() {
    let server = two_page_site().await;
    let orchestrator = crate::orchestrator(test_config());

    run_to_completion(&orchestrator, &server.uri(), true).await;
    let second = run_to_completion(&orchestrator, &server.uri(), false).await;

    assert_eq!(request_count(&server, "/").await, 2);
    assert_eq!(second.stats.pages_from_cache, 0);
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let server = two_page_site().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cache.db");

    {
        let cache = Arc::new(open_cache(&db_path).unwrap());
        let orchestrator = JobOrchestrator::new(test_config(), cache).unwrap();
        run_to_completion(&orchestrator, &server.uri(), true).await;
    }

    let cache = Arc::new(open_cache(&db_path).unwrap());
    let orchestrator = JobOrchestrator::new(test_config(), cache).unwrap();
    let stats = orchestrator.cache_stats().unwrap();
    assert_eq!(stats.count, 2);

    run_to_completion(&orchestrator, &server.uri(), true).await;
    assert_eq!(request_count(&server, "/about").await, 1);
}

#[tokio::test]
async fn test_clear_cache_forces_refetch() {
    let server = two_page_site().await;
    let orchestrator = crate::orchestrator(test_config());

    run_to_completion(&orchestrator, &server.uri(), true).await;
    assert_eq!(orchestrator.clear_cache().unwrap(), 2);
    assert_eq!(orchestrator.cache_stats().unwrap().count, 0);

    run_to_completion(&orchestrator, &server.uri(), true).await;
    assert_eq!(request_count(&server, "/about").await, 2);
}

#[tokio::test]
async fn test_cached_record_keeps_metrics() {
    let server = two_page_site().await;
    let cache: Arc<dyn CacheStore> = crate::in_memory_cache();
    let orchestrator = JobOrchestrator::new(test_config(), Arc::clone(&cache)).unwrap();

    run_to_completion(&orchestrator, &server.uri(), true).await;

    let record = cache
        .get(&page_url(&server, "/about"))
        .unwrap()
        .expect("Page should be cached");
    assert_eq!(record.status_code, 200);
    assert!(record.metrics.is_some());
    assert_eq!(record.content_hash.len(), 64);
}

#[tokio::test]
async fn test_stale_record_is_refetched() {
    let server = two_page_site().await;
    let cache: Arc<dyn CacheStore> = crate::in_memory_cache();
    let config = test_config();
    let max_age_hours = config.cache.max_age_hours;
    let orchestrator = JobOrchestrator::new(config, Arc::clone(&cache)).unwrap();

    let about = page_url(&server, "/about");
    let mut stale = CacheRecord::new(
        &about,
        "<html><title>Old</title></html>".to_string(),
        200,
        Some("text/html".to_string()),
        Duration::from_millis(10),
    );
    stale.fetched_at = Utc::now() - chrono::Duration::hours(max_age_hours + 1);
    cache.put(&stale).unwrap();

    let result = run_to_completion(&orchestrator, &server.uri(), true).await;

    assert_eq!(request_count(&server, "/about").await, 1);
    let page = result.pages.iter().find(|p| p.url == about).unwrap();
    assert_eq!(page.title.as_deref(), Some("About"));

    let refreshed = cache.get(&about).unwrap().unwrap();
    assert!(refreshed.fetched_at > stale.fetched_at);
    assert_ne!(refreshed.content_hash, stale.content_hash);
}

#[tokio::test]
async fn test_cached_run_resolves_links_against_redirect_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/home/"))
        .mount(&server)
        .await;
    mount_page(&server, "/home/", html_page("Home", &["child"])).await;
    mount_page(&server, "/home/child", html_page("Child", &[])).await;

    let orchestrator = crate::orchestrator(test_config());
    let first = run_to_completion(&orchestrator, &server.uri(), true).await;
    let second = run_to_completion(&orchestrator, &server.uri(), true).await;

    let urls = |result: &AnalysisResult| -> Vec<String> {
        result.pages.iter().map(|p| p.url.clone()).collect()
    };
    assert_eq!(
        urls(&first),
        vec![page_url(&server, "/"), page_url(&server, "/home/child")]
    );
    assert_eq!(urls(&first), urls(&second));
    assert_eq!(second.stats.pages_from_cache, 2);
    assert_eq!(second.stats.pages_failed, 0);
    assert_eq!(request_count(&server, "/home/child").await, 1);
}
