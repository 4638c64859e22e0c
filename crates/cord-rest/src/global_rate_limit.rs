//! Service-wide rate-limit cutoff.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::warn;

static PROCESS_LIMIT: Lazy<Arc<GlobalRateLimit>> = Lazy::new(|| Arc::new(GlobalRateLimit::new()));

/// Tracks whether a global (not per-route) rate limit is in force.
///
/// Every bucket consults this before firing. The flag clears itself once the
/// signalled retry-after has elapsed.
#[derive(Debug, Default)]
pub struct GlobalRateLimit {
    resume_at: Mutex<Option<Instant>>,
}

impl GlobalRateLimit {
    /// Create an inactive limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance shared by dispatchers that do not supply their own.
    #[must_use]
    pub fn process() -> Arc<Self> {
        Arc::clone(&PROCESS_LIMIT)
    }

    /// Record that the server signalled a global limit for `retry_after`.
    ///
    /// A shorter window never truncates one that is already running.
    pub fn reached(&self, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        let mut resume_at = self.resume_at.lock();
        if resume_at.is_none_or(|current| current < until) {
            *resume_at = Some(until);
        }
        warn!(retry_after_ms = retry_after.as_millis() as u64, "global rate limit reached");
    }

    /// Time left until firing may resume, `None` when inactive.
    pub fn remaining(&self) -> Option<Duration> {
        let mut resume_at = self.resume_at.lock();
        let now = Instant::now();
        match *resume_at {
            Some(at) if at > now => Some(at - now),
            Some(_) => {
                *resume_at = None;
                None
            }
            None => None,
        }
    }

    /// Whether the cutoff is currently active.
    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Clear the cutoff immediately.
    pub fn clear(&self) {
        *self.resume_at.lock() = None;
    }
}
