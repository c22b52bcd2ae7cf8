//! Page and site scoring

use crate::analyzer::{AnalysisResult, CrawlStats, Issue, PageResult, SeverityCounts};
use chrono::Utc;
use std::collections::HashSet;

/// Page score: 100 minus the penalty of every issue, floored at 0
pub fn page_score(issues: &[Issue]) -> u8 {
    let penalty: u32 = issues.iter().map(|i| i.severity.penalty()).sum();
    100u32.saturating_sub(penalty) as u8
}

/// Weight of a page in the overall score by link depth
///
/// The root page counts three times, pages one or two clicks away twice.
pub fn depth_weight(depth: u32) -> f64 {
    match depth {
        0 => 3.0,
        1 | 2 => 2.0,
        _ => 1.0,
    }
}

/// Weighted mean of page scores rounded to one decimal; 0.0 without pages
pub fn overall_score(pages: &[PageResult]) -> f64 {
    let (total, weight) = pages.iter().fold((0.0, 0.0), |(total, weight), page| {
        let w = depth_weight(page.depth);
        (total + f64::from(page.page_score) * w, weight + w)
    });

    if weight == 0.0 {
        return 0.0;
    }
    ((total / weight) * 10.0).round() / 10.0
}

/// Builds the Analysis Result from a job's page results
///
/// Pages are sorted by URL and a URL reported twice keeps its first result.
pub fn aggregate(
    target: &str,
    keyword: Option<&str>,
    mut pages: Vec<PageResult>,
    stats: CrawlStats,
) -> AnalysisResult {
    pages.sort_by(|a, b| a.url.cmp(&b.url));
    let mut seen = HashSet::new();
    pages.retain(|p| seen.insert(p.url.clone()));

    let mut severity_counts = SeverityCounts::default();
    for issue in pages.iter().flat_map(|p| p.issues.iter()) {
        severity_counts.record(issue.severity);
    }

    AnalysisResult {
        target: target.to_string(),
        keyword: keyword.map(str::to_string),
        overall_score: overall_score(&pages),
        severity_counts,
        stats,
        pages,
        serp: None,
        completed_at: Utc::now(),
    }
}
