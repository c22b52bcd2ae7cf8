//! Robots.txt parser
//!
//! Allow/disallow matching is delegated to the robotstxt crate; crawl delays
//! and sitemap declarations are read directly from the file.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Longest crawl delay honored from a robots.txt file
const MAX_CRAWL_DELAY: Duration = Duration::from_secs(30);

/// Parsed robots.txt rules for one host
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt content; empty allows everything
    content: String,

    /// URLs declared with `Sitemap:` lines, in file order
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Parses raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        let sitemaps = directives(content)
            .filter(|(key, _)| key == "sitemap")
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
            .collect();

        Self {
            content: content.to_string(),
            sitemaps,
        }
    }

    /// Rules that allow every URL
    ///
    /// Used when robots.txt is missing, unreachable or robots handling is
    /// switched off for the job.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if a URL is allowed for the given user agent token
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The crawler's product token (e.g. "SeoAuditBot")
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Crawl delay requested for the given user agent, capped at 30 seconds
    ///
    /// A group naming the agent takes precedence over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent = user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_open = true;
        let mut specific = None;
        let mut wildcard = None;

        for (key, value) in directives(&self.content) {
            match key.as_str() {
                "user-agent" => {
                    if !group_open {
                        group.clear();
                        group_open = true;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_open = false;
                    let Ok(secs) = value.parse::<f64>() else {
                        continue;
                    };
                    if !secs.is_finite() || secs < 0.0 {
                        continue;
                    }
                    let delay = Duration::from_secs_f64(secs).min(MAX_CRAWL_DELAY);
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        specific = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(delay);
                    }
                }
                _ => group_open = false,
            }
        }

        specific.or(wildcard)
    }

    /// Sitemap URLs declared in the file
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Iterates `(lowercased key, value)` pairs, skipping comments and blank lines
fn directives(content: &str) -> impl Iterator<Item = (String, &str)> {
    content.lines().filter_map(|line| {
        let line = line.split('#').next().unwrap_or("").trim();
        let (key, value) = line.split_once(':')?;
        Some((key.trim().to_lowercase(), value.trim()))
    })
}
