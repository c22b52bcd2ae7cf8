//! URL handling module
//!
//! This module provides URL normalization, host extraction and the same-site
//! scope check used to keep a crawl on the audited site.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_same_site, registrable_domain};
pub use normalize::normalize_url;

use ::url::Url;

/// Resolves a raw link against the page it was found on and normalizes it
///
/// Returns `None` for links that cannot be parsed or that use a scheme other
/// than HTTP(S).
pub fn resolve_and_normalize(base: &Url, href: &str) -> Option<Url> {
    let joined = base.join(href.trim()).ok()?;
    normalize_url(joined.as_str()).ok()
}
