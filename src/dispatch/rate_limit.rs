use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::error::GhostError;
use crate::session::{Session, SessionCounters};

/// Fixed wait before re-checking an exhausted budget.
pub const BACKOFF: Duration = Duration::from_secs(1);

/// Source of the current wall-clock minute.
pub trait MinuteClock: Send + Sync {
    /// Whole minutes since the Unix epoch.
    fn current_minute(&self) -> u64;
}

pub struct SystemClock;

impl MinuteClock for SystemClock {
    fn current_minute(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            / 60
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Budget exhausted for this minute; check again after `BACKOFF`.
    Wait,
}

/// Requests-per-minute gate. State lives in `SessionCounters`; the limiter
/// only holds the clock and the backoff policy.
pub struct RateLimiter {
    clock: Arc<dyn MinuteClock>,
    backoff: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn MinuteClock>) -> Self {
        Self {
            clock,
            backoff: BACKOFF,
        }
    }

    /// One admission step.
    ///
    /// A new minute resets the bucket. The comparison is strictly `>`: with
    /// `requests_this_minute == limit` the request is still admitted.
    pub fn check(&self, counters: &mut SessionCounters, limit: u32) -> Admission {
        let minute = self.clock.current_minute();
        if minute > counters.current_minute {
            counters.current_minute = minute;
            counters.requests_this_minute = 0;
            return Admission::Admitted;
        }
        if counters.requests_this_minute > u64::from(limit) {
            Admission::Wait
        } else {
            Admission::Admitted
        }
    }

    /// Wait until the budget admits this call or `token` is cancelled.
    ///
    /// The caller increments `requests_this_minute` after a successful
    /// dispatch, not here.
    pub async fn admit(
        &self,
        session: &Session,
        limit: u32,
        token: &CancellationToken,
    ) -> Result<(), GhostError> {
        loop {
            if token.is_cancelled() {
                return Err(GhostError::Cancelled);
            }
            match session.update(|c| self.check(c, limit)) {
                Admission::Admitted => return Ok(()),
                Admission::Wait => {
                    tracing::debug!(limit, "rate limit reached, backing off");
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(GhostError::Cancelled),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }
}
