use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window limit on accepted job submissions
///
/// Shared by every submitting caller in the process.
pub struct SubmissionLimiter {
    max_submissions: usize,
    window: Duration,
    accepted: Mutex<VecDeque<Instant>>,
}

impl SubmissionLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_submissions: config.max_submissions,
            window: Duration::from_secs(config.window_secs),
            accepted: Mutex::new(VecDeque::new()),
        }
    }

    /// Records a submission at `now` if the window has room
    ///
    /// Returns the time until a slot frees up when it does not.
    pub fn try_acquire(&self, now: Instant) -> Result<(), Duration> {
        let mut accepted = match self.accepted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        while let Some(&oldest) = accepted.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                accepted.pop_front();
            } else {
                break;
            }
        }

        if accepted.len() >= self.max_submissions {
            let retry_after = accepted
                .front()
                .map(|&oldest| self.window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }

        accepted.push_back(now);
        Ok(())
    }
}
