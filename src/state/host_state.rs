use std::time::{Duration, Instant};

/// Tracks request spacing for one host
///
/// Each fetch reserves the next free slot before sleeping, so concurrent
/// workers aimed at the same host queue up behind each other instead of
/// firing together once the delay elapses.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests issued to this host by the current job
    pub request_count: u32,

    /// Crawl delay requested by the host's robots.txt
    pub crawl_delay: Option<Duration>,

    /// Earliest instant the next request may start
    next_slot: Option<Instant>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next slot and returns how long the caller must wait for it
    ///
    /// # Arguments
    ///
    /// * `now` - The current time instant
    /// * `delay` - Minimum spacing between two requests to this host; a
    ///   longer robots.txt crawl delay wins
    ///
    /// # Returns
    ///
    /// The wait before the reserved slot starts (zero if it starts now)
    pub fn reserve_slot(&mut self, now: Instant, delay: Duration) -> Duration {
        let delay = self.crawl_delay.map_or(delay, |d| d.max(delay));
        let start = match self.next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };

        self.next_slot = Some(start + delay);
        self.request_count += 1;
        start - now
    }
}
