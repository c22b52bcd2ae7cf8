//! SEO rule set
//!
//! Each rule yields at most one issue with a fixed severity.
//!
//! | Code | Severity |
//! |------|----------|
//! | `fetch_failed`, `http_error` | critical |
//! | `not_https` | critical |
//! | `missing_title` | critical |
//! | `title_length` | medium |
//! | `missing_meta_description` | high |
//! | `meta_description_length` | high |
//! | `missing_h1` | high |
//! | `multiple_h1` | medium |
//! | `thin_content` | medium |
//! | `images_missing_alt` | medium |
//! | `missing_viewport` | medium |
//! | `missing_canonical` | low |
//! | `missing_open_graph` | low |
//! | `missing_twitter_card` | low |
//! | `missing_structured_data` | low |
//! | `keyword_not_in_title` | medium |
//! | `keyword_not_in_h1` | medium |
//! | `keyword_not_in_meta_description` | medium |
//! | `keyword_density` | low |
//! | `slow_page` | high |
//!
//! Keyword rules run only when a target keyword is supplied.

use crate::analyzer::metrics::Extraction;
use crate::analyzer::{Issue, Severity};
use crate::crawler::FetchError;
use std::time::Duration;
use url::Url;

pub const TITLE_MIN_CHARS: usize = 30;
pub const TITLE_MAX_CHARS: usize = 60;
pub const META_DESCRIPTION_MIN_CHARS: usize = 50;
pub const META_DESCRIPTION_MAX_CHARS: usize = 160;
pub const MIN_WORD_COUNT: usize = 300;
pub const KEYWORD_DENSITY_MIN: f64 = 0.5;
pub const KEYWORD_DENSITY_MAX: f64 = 3.0;
pub const SLOW_PAGE_THRESHOLD: Duration = Duration::from_secs(5);

/// Issues for a page that produced no analyzable content
///
/// `status_code` is the response status when one was received.
pub fn fetch_issues(url: &Url, status_code: Option<u16>, error: &FetchError) -> Vec<Issue> {
    let mut issues = Vec::new();

    match status_code {
        Some(status) if status >= 400 => issues.push(Issue::new(
            Severity::Critical,
            "http_error",
            format!("Page returned HTTP {}", status),
        )),
        _ => issues.push(Issue::new(
            Severity::Critical,
            "fetch_failed",
            format!("Page could not be fetched: {}", error),
        )),
    }

    https_rule(url, &mut issues);
    issues
}

fn https_rule(url: &Url, issues: &mut Vec<Issue>) {
    if url.scheme() != "https" {
        issues.push(Issue::new(
            Severity::Critical,
            "not_https",
            "Page is not served over HTTPS",
        ));
    }
}

/// Evaluates every content rule against an analyzed page
pub fn content_issues(url: &Url, page: &Extraction, keyword: Option<&str>) -> Vec<Issue> {
    let mut issues = Vec::new();

    https_rule(url, &mut issues);

    match &page.title {
        None => issues.push(Issue::new(
            Severity::Critical,
            "missing_title",
            "Page has no <title>",
        )),
        Some(title) => {
            let len = title.chars().count();
            if len < TITLE_MIN_CHARS {
                issues.push(Issue::new(
                    Severity::Medium,
                    "title_length",
                    format!(
                        "Title too short ({} chars, recommended {}-{})",
                        len, TITLE_MIN_CHARS, TITLE_MAX_CHARS
                    ),
                ));
            } else if len > TITLE_MAX_CHARS {
                issues.push(Issue::new(
                    Severity::Medium,
                    "title_length",
                    format!(
                        "Title too long ({} chars, recommended {}-{})",
                        len, TITLE_MIN_CHARS, TITLE_MAX_CHARS
                    ),
                ));
            }
        }
    }

    match &page.meta_description {
        None => issues.push(Issue::new(
            Severity::High,
            "missing_meta_description",
            "Page has no meta description",
        )),
        Some(description) => {
            let len = description.chars().count();
            if !(META_DESCRIPTION_MIN_CHARS..=META_DESCRIPTION_MAX_CHARS).contains(&len) {
                issues.push(Issue::new(
                    Severity::High,
                    "meta_description_length",
                    format!(
                        "Meta description is {} chars, recommended {}-{}",
                        len, META_DESCRIPTION_MIN_CHARS, META_DESCRIPTION_MAX_CHARS
                    ),
                ));
            }
        }
    }

    match page.headings.h1 {
        0 => issues.push(Issue::new(Severity::High, "missing_h1", "Page has no H1")),
        1 => {}
        n => issues.push(Issue::new(
            Severity::Medium,
            "multiple_h1",
            format!("Page has {} H1 headings, expected one", n),
        )),
    }

    if page.word_count < MIN_WORD_COUNT {
        issues.push(Issue::new(
            Severity::Medium,
            "thin_content",
            format!(
                "Thin content ({} words, recommended {}+)",
                page.word_count, MIN_WORD_COUNT
            ),
        ));
    }

    let metrics = &page.metrics;

    if metrics.images_missing_alt > 0 {
        issues.push(Issue::new(
            Severity::Medium,
            "images_missing_alt",
            format!(
                "{} of {} images missing alt text",
                metrics.images_missing_alt, metrics.images
            ),
        ));
    }

    if !metrics.has_viewport {
        issues.push(Issue::new(
            Severity::Medium,
            "missing_viewport",
            "Page has no viewport meta tag",
        ));
    }

    if metrics.canonical.is_none() {
        issues.push(Issue::new(
            Severity::Low,
            "missing_canonical",
            "Page has no canonical link",
        ));
    }

    if !metrics.has_open_graph {
        issues.push(Issue::new(
            Severity::Low,
            "missing_open_graph",
            "Page has no Open Graph tags",
        ));
    }

    if !metrics.has_twitter_card {
        issues.push(Issue::new(
            Severity::Low,
            "missing_twitter_card",
            "Page has no Twitter Card tags",
        ));
    }

    if !metrics.has_structured_data {
        issues.push(Issue::new(
            Severity::Low,
            "missing_structured_data",
            "Page has no JSON-LD structured data",
        ));
    }

    if let Some(keyword) = keyword {
        let needle = keyword.to_lowercase();
        let mentions = |text: &str| text.to_lowercase().contains(&needle);

        if !page.title.as_deref().map_or(false, mentions) {
            issues.push(Issue::new(
                Severity::Medium,
                "keyword_not_in_title",
                format!("Target keyword '{}' does not appear in the title", keyword),
            ));
        }

        // Absent H1 or description is already its own issue
        if !page.headings.h1_text.is_empty()
            && !page.headings.h1_text.iter().any(|h| mentions(h.as_str()))
        {
            issues.push(Issue::new(
                Severity::Medium,
                "keyword_not_in_h1",
                format!("Target keyword '{}' does not appear in the H1", keyword),
            ));
        }

        if let Some(description) = &page.meta_description {
            if !mentions(description.as_str()) {
                issues.push(Issue::new(
                    Severity::Medium,
                    "keyword_not_in_meta_description",
                    format!(
                        "Target keyword '{}' does not appear in the meta description",
                        keyword
                    ),
                ));
            }
        }

        let density = metrics.keyword_density;
        if !(KEYWORD_DENSITY_MIN..=KEYWORD_DENSITY_MAX).contains(&density) {
            issues.push(Issue::new(
                Severity::Low,
                "keyword_density",
                format!(
                    "Keyword density {:.2}% outside {}-{}%",
                    density, KEYWORD_DENSITY_MIN, KEYWORD_DENSITY_MAX
                ),
            ));
        }
    }

    issues
}

/// Issues from how the page was served rather than what it contains
pub fn performance_issues(load_time: Duration) -> Vec<Issue> {
    let mut issues = Vec::new();
    if load_time > SLOW_PAGE_THRESHOLD {
        issues.push(Issue::new(
            Severity::High,
            "slow_page",
            format!(
                "Page took {:.1}s to load (over {}s)",
                load_time.as_secs_f64(),
                SLOW_PAGE_THRESHOLD.as_secs()
            ),
        ));
    }
    issues
}
