//! Phase definitions for a single crawl
//!
//! A crawl moves strictly forward through its phases; `Cancelled` can be
//! entered from any phase that has not yet finished.
use std::fmt;

/// Current phase of a Crawl Coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Coordinator built, nothing fetched yet
    Init,

    /// Fetching the root page, robots.txt and sitemaps
    Discovering,

    /// Worker pool is draining the frontier
    Crawling,

    /// Aggregating page results into the analysis result
    Scoring,

    /// Analysis result produced
    Done,

    /// Stopped by a cancellation request
    Cancelled,
}

impl CrawlPhase {
    /// Returns true for `Done` and `Cancelled`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        if self.is_terminal() {
            return false;
        }

        match next {
            Self::Cancelled => true,
            Self::Discovering => *self == Self::Init,
            Self::Crawling => *self == Self::Discovering,
            Self::Scoring => *self == Self::Crawling,
            Self::Done => *self == Self::Scoring,
            Self::Init => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Discovering => "discovering",
            Self::Crawling => "crawling",
            Self::Scoring => "scoring",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
