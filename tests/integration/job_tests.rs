//! Job lifecycle tests through the orchestrator

use crate::{
    html_page, job_config, mount_page, orchestrator, page_url, test_config, wait_for_terminal,
};
use seo_audit::analyzer::{SerpComparison, SerpEntry};
use seo_audit::jobs::{JobId, JobStatus, QueryError, SubmitError};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A site whose pages answer slowly enough to observe a running job
async fn slow_site(pages: usize, delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    let links: Vec<String> = (0..pages).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Home", &link_refs), "text/html")
                .set_delay(delay),
        )
        .mount(&server)
        .await;

    for link in &links {
        Mock::given(method("GET"))
            .and(path(link.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(html_page("Page", &[]), "text/html")
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
    }
    server
}

#[tokio::test]
async fn test_job_completes_and_report_is_available() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/about"])).await;
    mount_page(&server, "/about", html_page("About", &[])).await;

    let orchestrator = orchestrator(test_config());
    let submission = orchestrator
        .submit(&server.uri(), Some("widgets"), job_config(10))
        .unwrap();

    let status = wait_for_terminal(&orchestrator, &submission.id).await;
    assert_eq!(status.status, JobStatus::Completed);
    assert!(status.error.is_none());
    assert_eq!(status.progress.percent, 100.0);

    let report = orchestrator.report(&submission.id).unwrap();
    assert_eq!(report.target, page_url(&server, "/"));
    assert_eq!(report.keyword.as_deref(), Some("widgets"));
    assert_eq!(report.pages.len(), 2);
}

#[tokio::test]
async fn test_status_is_visible_immediately_after_submit() {
    let server = slow_site(1, Duration::from_millis(200)).await;
    let orchestrator = orchestrator(test_config());

    let submission = orchestrator.submit(&server.uri(), None, job_config(5)).unwrap();
    let status = orchestrator.status(&submission.id).unwrap();

    assert!(matches!(status.status, JobStatus::Queued | JobStatus::Running));
    assert_eq!(status.id, submission.id);
    assert!(submission.estimated_duration > Duration::ZERO);

    wait_for_terminal(&orchestrator, &submission.id).await;
}

#[tokio::test]
async fn test_report_before_completion_is_not_ready() {
    let server = slow_site(0, Duration::from_millis(500)).await;
    let orchestrator = orchestrator(test_config());

    let submission = orchestrator.submit(&server.uri(), None, job_config(5)).unwrap();

    match orchestrator.report(&submission.id) {
        Err(QueryError::NotReady { status }) => assert!(!status.is_terminal()),
        other => panic!("Expected NotReady, got {:?}", other),
    }

    wait_for_terminal(&orchestrator, &submission.id).await;
    assert!(orchestrator.report(&submission.id).is_ok());
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let orchestrator = orchestrator(test_config());
    let id = JobId::new();

    assert_eq!(orchestrator.status(&id), Err(QueryError::NotFound(id)));
    assert_eq!(orchestrator.report(&id), Err(QueryError::NotFound(id)));
    assert_eq!(orchestrator.cancel(&id), Err(QueryError::NotFound(id)));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let orchestrator = orchestrator(test_config());

    let bad_url = orchestrator.submit("ftp://example.com/", None, job_config(5));
    assert!(matches!(bad_url, Err(SubmitError::Validation(_))));

    let bad_keyword = orchestrator.submit("https://example.com/", Some("bad\u{0}word"), job_config(5));
    assert!(matches!(bad_keyword, Err(SubmitError::Validation(_))));

    let too_many_pages = orchestrator.submit("https://example.com/", None, job_config(10_000));
    assert!(matches!(too_many_pages, Err(SubmitError::Validation(_))));
}

#[tokio::test]
async fn test_cancel_mid_crawl() {
    let server = slow_site(20, Duration::from_millis(150)).await;
    let orchestrator = orchestrator(test_config());
    let job = seo_audit::JobConfig {
        concurrency: 1,
        ..job_config(50)
    };

    let submission = orchestrator.submit(&server.uri(), None, job).unwrap();

    // Wait for the root page so the crawl is underway
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while orchestrator.status(&submission.id).unwrap().progress.step == 0 {
        assert!(tokio::time::Instant::now() < deadline, "Crawl never progressed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    orchestrator.cancel(&submission.id).unwrap();
    let status = wait_for_terminal(&orchestrator, &submission.id).await;
    assert_eq!(status.status, JobStatus::Cancelled);

    assert_eq!(
        orchestrator.report(&submission.id),
        Err(QueryError::NotReady {
            status: JobStatus::Cancelled
        })
    );

    // In-flight work winding down must not change the outcome
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        orchestrator.status(&submission.id).unwrap().status,
        JobStatus::Cancelled
    );
    assert!(orchestrator.report(&submission.id).is_err());

    let partial = orchestrator.diagnostics(&submission.id).unwrap();
    assert!(partial.len() < 21);
}

#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &[])).await;

    let orchestrator = orchestrator(test_config());
    let submission = orchestrator.submit(&server.uri(), None, job_config(1)).unwrap();
    wait_for_terminal(&orchestrator, &submission.id).await;

    orchestrator.cancel(&submission.id).unwrap();
    assert_eq!(
        orchestrator.status(&submission.id).unwrap().status,
        JobStatus::Completed
    );
    assert!(orchestrator.report(&submission.id).is_ok());
}

#[tokio::test]
async fn test_observed_transitions_and_progress_are_legal() {
    let server = slow_site(6, Duration::from_millis(30)).await;
    let orchestrator = orchestrator(test_config());

    let submission = orchestrator.submit(&server.uri(), None, job_config(10)).unwrap();

    let mut statuses = Vec::new();
    let mut percents = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    loop {
        let view = orchestrator.status(&submission.id).unwrap();
        statuses.push(view.status);
        percents.push(view.progress.percent);
        if view.status.is_terminal() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "Job did not finish");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for pair in statuses.windows(2) {
        assert!(
            pair[0] == pair[1] || pair[0].can_transition_to(pair[1]),
            "Illegal transition {} -> {}",
            pair[0],
            pair[1]
        );
    }
    for pair in percents.windows(2) {
        assert!(pair[0] <= pair[1], "Progress went backwards: {:?}", percents);
    }
    assert_eq!(statuses.last(), Some(&JobStatus::Completed));
}

#[tokio::test]
async fn test_unreachable_root_marks_job_failed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);

    let mut config = test_config();
    config.fetcher.max_retries = 0;
    let orchestrator = orchestrator(config);

    let submission = orchestrator
        .submit(&format!("http://127.0.0.1:{}/", port), None, job_config(5))
        .unwrap();
    let status = wait_for_terminal(&orchestrator, &submission.id).await;

    assert_eq!(status.status, JobStatus::Failed);
    assert!(status.error.is_some());
    assert_eq!(
        orchestrator.report(&submission.id),
        Err(QueryError::NotReady {
            status: JobStatus::Failed
        })
    );
}

#[tokio::test]
async fn test_attach_serp_to_completed_report() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &[])).await;

    let orchestrator = orchestrator(test_config());
    let submission = orchestrator
        .submit(&server.uri(), Some("widgets"), job_config(1))
        .unwrap();
    wait_for_terminal(&orchestrator, &submission.id).await;

    let serp = SerpComparison {
        keyword: "widgets".to_string(),
        target_position: Some(4),
        competitors: vec![SerpEntry {
            position: 1,
            url: "https://competitor.example/".to_string(),
            title: "Best widgets".to_string(),
        }],
    };
    orchestrator.attach_serp(&submission.id, serp.clone()).unwrap();

    let report = orchestrator.report(&submission.id).unwrap();
    assert_eq!(report.serp, Some(serp));
}
