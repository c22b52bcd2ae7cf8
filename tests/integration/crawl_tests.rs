//! End-to-end crawl behaviour against mock sites

use crate::{html_page, in_memory_cache, job_config, mount_page, page_url, test_config};
use seo_audit::crawler::{build_http_client, Coordinator, CrawlContext, CrawlOutcome, NoopProgress};
use seo_audit::{normalize_url, AuditError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context(config: seo_audit::EngineConfig) -> CrawlContext {
    let client = build_http_client(&config.fetcher, &config.user_agent)
        .expect("Failed to build HTTP client");
    CrawlContext {
        engine: Arc::new(config),
        client,
        cache: in_memory_cache(),
    }
}

async fn crawl(
    server: &MockServer,
    job: seo_audit::JobConfig,
) -> Result<CrawlOutcome, AuditError> {
    let target = normalize_url(&server.uri()).expect("Mock server URI should normalize");
    Coordinator::new(
        target,
        None,
        &job,
        &context(test_config()),
        CancellationToken::new(),
        Arc::new(NoopProgress),
    )
    .run()
    .await
}

fn completed(outcome: Result<CrawlOutcome, AuditError>) -> seo_audit::AnalysisResult {
    match outcome {
        Ok(CrawlOutcome::Completed(result)) => result,
        other => panic!("Expected a completed crawl, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_crawl_follows_links() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a", "/b", "https://other.org/x"])).await;
    mount_page(&server, "/a", html_page("A", &["/c", "/"])).await;
    mount_page(&server, "/b", html_page("B", &["/a"])).await;
    mount_page(&server, "/c", html_page("C", &[])).await;

    let result = completed(crawl(&server, job_config(10)).await);

    let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            page_url(&server, "/"),
            page_url(&server, "/a"),
            page_url(&server, "/b"),
            page_url(&server, "/c"),
        ]
    );

    let root = &result.pages[0];
    assert_eq!(root.depth, 0);
    assert_eq!(root.status_code, Some(200));
    assert_eq!(root.title.as_deref(), Some("Home"));
    assert_eq!(root.links.internal, 2);
    assert_eq!(root.links.external, 1);

    let c = &result.pages[3];
    assert_eq!(c.depth, 2);
    assert_eq!(result.stats.pages_fetched, 4);
    assert!(result.overall_score > 0.0);
}

#[tokio::test]
async fn test_max_pages_one_yields_only_root() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a", "/b"])).await;
    mount_page(&server, "/a", html_page("A", &[])).await;
    mount_page(&server, "/b", html_page("B", &[])).await;

    let result = completed(crawl(&server, job_config(1)).await);

    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].url, page_url(&server, "/"));
    assert_eq!(crate::request_count(&server, "/a").await, 0);
}

#[tokio::test]
async fn test_root_500_then_200_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", &[])).await;

    let result = completed(crawl(&server, job_config(5)).await);

    assert_eq!(result.pages.len(), 1);
    let root = &result.pages[0];
    assert_eq!(root.status_code, Some(200));
    assert!(root.fetch_error.is_none());
    assert!(root
        .issues
        .iter()
        .all(|i| i.code != "fetch_failed" && i.code != "http_error"));
    assert_eq!(crate::request_count(&server, "/").await, 2);
}

#[tokio::test]
async fn test_404_is_not_retried_and_recorded() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/missing"])).await;

    let result = completed(crawl(&server, job_config(5)).await);

    let missing = result
        .pages
        .iter()
        .find(|p| p.url == page_url(&server, "/missing"))
        .expect("Missing page should be recorded");
    assert_eq!(missing.status_code, Some(404));
    assert_eq!(missing.issues[0].code, "http_error");
    assert_eq!(result.stats.pages_failed, 1);
    assert_eq!(crate::request_count(&server, "/missing").await, 1);
}

#[tokio::test]
async fn test_robots_disallow_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", &["/private", "/public"])).await;
    mount_page(&server, "/private", html_page("Private", &[])).await;
    mount_page(&server, "/public", html_page("Public", &[])).await;

    let result = completed(crawl(&server, job_config(10)).await);

    let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
    assert!(urls.contains(&page_url(&server, "/public").as_str()));
    assert!(!urls.contains(&page_url(&server, "/private").as_str()));
    assert_eq!(crate::request_count(&server, "/private").await, 0);
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", &["/page"])).await;
    mount_page(&server, "/page", html_page("Page", &[])).await;

    let job = seo_audit::JobConfig {
        respect_robots: false,
        ..job_config(10)
    };
    let result = completed(crawl(&server, job).await);

    assert_eq!(result.pages.len(), 2);
}

#[tokio::test]
async fn test_sitemap_urls_are_crawled() {
    let server = MockServer::start().await;
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{}</loc></url>
</urlset>"#,
        page_url(&server, "/only-in-sitemap")
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", &[])).await;
    mount_page(&server, "/only-in-sitemap", html_page("Hidden", &[])).await;

    let result = completed(crawl(&server, job_config(10)).await);

    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.pages[1].url, page_url(&server, "/only-in-sitemap"));
    assert_eq!(result.pages[1].depth, 1);
    assert_eq!(result.stats.sitemap_urls, 1);
}

#[tokio::test]
async fn test_unreachable_root_fails() {
    // Bind then drop a listener to get a port nothing is serving
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);

    let mut config = test_config();
    config.fetcher.max_retries = 1;
    let target = normalize_url(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let outcome = Coordinator::new(
        target,
        None,
        &job_config(5),
        &context(config),
        CancellationToken::new(),
        Arc::new(NoopProgress),
    )
    .run()
    .await;

    assert!(matches!(outcome, Err(AuditError::Frontier(_))), "{:?}", outcome);
}

#[tokio::test]
async fn test_cancelled_before_start_returns_cancelled() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &[])).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let target = normalize_url(&server.uri()).unwrap();
    let outcome = Coordinator::new(
        target,
        None,
        &job_config(5),
        &context(test_config()),
        cancel,
        Arc::new(NoopProgress),
    )
    .run()
    .await;

    assert!(matches!(outcome, Ok(CrawlOutcome::Cancelled { .. })));
}

#[tokio::test]
async fn test_non_html_pages_are_not_parsed_for_links() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/data.json"])).await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                r#"{"link": "<a href=\"/secret\">x</a>"}"#,
                "application/json",
            ),
        )
        .mount(&server)
        .await;

    let result = completed(crawl(&server, job_config(10)).await);

    assert_eq!(result.pages.len(), 2);
    assert_eq!(crate::request_count(&server, "/secret").await, 0);
}

#[tokio::test]
async fn test_well_known_sitemap_locations_are_checked() {
    let server = MockServer::start().await;
    let index = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{}</loc></sitemap>
</sitemapindex>"#,
        page_url(&server, "/nested-sitemap.xml")
    );
    let nested = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{}</loc></url>
</urlset>"#,
        page_url(&server, "/from-index")
    );
    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(index, "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nested-sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(nested, "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("{}\n", page_url(&server, "/from-text")),
            "text/plain",
        ))
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", &[])).await;
    mount_page(&server, "/from-index", html_page("Indexed", &[])).await;
    mount_page(&server, "/from-text", html_page("Listed", &[])).await;

    let result = completed(crawl(&server, job_config(10)).await);

    let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
    assert!(urls.contains(&page_url(&server, "/from-index").as_str()), "{:?}", urls);
    assert!(urls.contains(&page_url(&server, "/from-text").as_str()), "{:?}", urls);
    assert_eq!(result.stats.sitemap_urls, 2);
    for sitemap_path in ["/sitemap.xml", "/sitemap_index.xml", "/sitemaps.xml", "/sitemap.txt"] {
        assert_eq!(crate::request_count(&server, sitemap_path).await, 1, "{}", sitemap_path);
    }
}

#[tokio::test]
async fn test_declared_sitemap_skips_well_known_locations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("User-agent: *\nAllow: /\nSitemap: {}\n", page_url(&server, "/custom.txt")),
            "text/plain",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/custom.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("{}\n", page_url(&server, "/declared")),
            "text/plain",
        ))
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", &[])).await;
    mount_page(&server, "/declared", html_page("Declared", &[])).await;

    let result = completed(crawl(&server, job_config(10)).await);

    assert_eq!(result.pages.len(), 2);
    assert_eq!(crate::request_count(&server, "/sitemap.xml").await, 0);
    assert_eq!(crate::request_count(&server, "/sitemap.txt").await, 0);
}

#[tokio::test]
async fn test_politeness_delay_spaces_requests() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a", "/b"])).await;
    mount_page(&server, "/a", html_page("A", &[])).await;
    mount_page(&server, "/b", html_page("B", &[])).await;

    let delay = Duration::from_millis(100);
    let mut config = test_config();
    config.fetcher.politeness_delay_ms = delay.as_millis() as u64;
    let target = normalize_url(&server.uri()).unwrap();

    let started = Instant::now();
    let outcome = Coordinator::new(
        target,
        None,
        &job_config(10),
        &context(config),
        CancellationToken::new(),
        Arc::new(NoopProgress),
    )
    .run()
    .await;
    let elapsed = started.elapsed();

    let result = completed(outcome);
    assert_eq!(result.pages.len(), 3);

    // robots.txt, the sitemap lookups and every page share one host slot
    let requests = server.received_requests().await.unwrap_or_default().len() as u32;
    assert!(requests >= 3);
    assert!(
        elapsed >= delay * (requests - 1),
        "{} requests finished in {:?}",
        requests,
        elapsed
    );
}
