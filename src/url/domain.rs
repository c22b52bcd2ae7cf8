use url::{Host, Url};

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_audit::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the registrable domain using the Public Suffix List
///
/// `https://blog.example.co.uk/` yields `example.co.uk`. IP addresses and
/// single-label hosts such as `localhost` have no registrable domain, so the
/// bare host is returned for them.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_audit::url::registrable_domain;
///
/// let url = Url::parse("https://shop.example.co.uk/cart").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.co.uk".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => {
            let host = domain.trim_end_matches('.').to_lowercase();
            if !host.contains('.') {
                return Some(host);
            }
            psl::domain_str(&host).map(str::to_string)
        }
        Host::Ipv4(_) | Host::Ipv6(_) => extract_domain(url),
    }
}

/// Checks whether `candidate` belongs to the same site as `root`
///
/// A URL is in scope when both hosts share a registrable domain, so
/// `www.example.com`, `example.com` and `blog.example.com` are one site.
/// The port must match so that a different service on the same host is not
/// crawled.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_audit::url::is_same_site;
///
/// let root = Url::parse("https://blog.example.com/").unwrap();
/// assert!(is_same_site(&root, &Url::parse("https://example.com/a").unwrap()));
/// assert!(is_same_site(&root, &Url::parse("https://www.example.com/b").unwrap()));
/// assert!(!is_same_site(&root, &Url::parse("https://example.org/").unwrap()));
/// ```
pub fn is_same_site(root: &Url, candidate: &Url) -> bool {
    if root.port_or_known_default() != candidate.port_or_known_default()
        && root.scheme() == candidate.scheme()
    {
        return false;
    }

    match (registrable_domain(root), registrable_domain(candidate)) {
        (Some(root_domain), Some(candidate_domain)) => root_domain == candidate_domain,
        _ => false,
    }
}
