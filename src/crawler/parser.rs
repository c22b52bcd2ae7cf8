//! Link extraction for frontier discovery
//!
//! # Link Extraction Rules
//!
//! **Include:**
//! - `<a href="...">` anywhere in the document
//! - `<link rel="canonical" href="...">`
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` and `data:` links
//! - Fragment-only links (same-page anchors)
//!
//! `rel="nofollow"` links are followed; an audit wants to see those pages too.
//!
//! Relative links resolve against `<base href>` when present, otherwise
//! against the page URL.

use crate::url::resolve_and_normalize;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

const SKIPPED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "#"];

/// Extracts every followable link from an HTML page
///
/// # Arguments
///
/// * `html` - The HTML content
/// * `page_url` - The URL the page was served from (after redirects)
///
/// # Returns
///
/// Normalized absolute URLs in document order, without duplicates
///
/// # Example
///
/// ```
/// use seo_audit::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/about/">About</a><a href="mailto:x@example.com">Mail</a>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let links = extract_links(html, &base);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://example.com/about");
/// ```
pub fn extract_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        let href = href.trim();
        if href.is_empty() || SKIPPED_PREFIXES.iter().any(|p| href.starts_with(p)) {
            return;
        }
        if let Some(url) = resolve_and_normalize(&base, href) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    };

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves the `<base href>` of a document, falling back to the page URL
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|e| e.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}
