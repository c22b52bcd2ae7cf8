//! Robots.txt and sitemap handling
//!
//! This module parses robots.txt files (allow/disallow rules, crawl delays and
//! `Sitemap:` declarations) and sitemap documents in XML or plain-text form.
//! Fetching happens in the crawler; everything here is pure parsing.

mod parser;
mod sitemap;

pub use parser::RobotsRules;
pub use sitemap::{parse_sitemap, SitemapDocument};

use url::Url;

/// Well-known sitemap locations tried when robots.txt declares none
pub const WELL_KNOWN_SITEMAP_PATHS: [&str; 4] = [
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemaps.xml",
    "/sitemap.txt",
];

/// Returns the robots.txt URL for the origin of `root`
pub fn robots_url(root: &Url) -> Option<Url> {
    root.join("/robots.txt").ok()
}

/// Returns the well-known sitemap URLs for the origin of `root`, in the order they are tried
pub fn well_known_sitemap_urls(root: &Url) -> Vec<Url> {
    WELL_KNOWN_SITEMAP_PATHS
        .iter()
        .filter_map(|path| root.join(path).ok())
        .collect()
}
