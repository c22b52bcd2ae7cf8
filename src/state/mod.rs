//! State tracking for a running audit
//!
//! # Components
//!
//! - `CrawlPhase`: The coordinator's state machine (init, discovering, crawling, scoring, done, cancelled)
//! - `HostState`: Per-host request spacing used by the fetcher's politeness gate

mod crawl_phase;
mod host_state;

pub use crawl_phase::CrawlPhase;
pub use host_state::HostState;
