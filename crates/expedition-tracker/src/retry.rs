//! Reconnection policy for the event channel.
//!
//! Exponential backoff: delays start at one second and double per
//! consecutive failure, capped at thirty seconds. After five consecutive
//! failures the client stops retrying entirely -- no "gave up" event is
//! emitted, subscribers just keep seeing the disconnected flag. There is
//! no jitter and no backoff state survives a process restart.
//!
//! A successful transport connect resets the failure counter, so a
//! long-lived connection that drops starts over from the one-second delay.

use std::time::Duration;

/// Default initial backoff delay.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default backoff ceiling.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default number of consecutive failures tolerated before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Capped exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Ceiling applied to every delay.
    pub max_delay: Duration,
    /// Consecutive failures tolerated before abandoning reconnection.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// The stock policy: 1s initial, doubling, 30s cap, 5 attempts.
    pub const fn new() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay ceiling.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the failure budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay to wait after the `failures`-th consecutive failure
    /// (1-indexed), or `None` once the failure budget is exhausted.
    ///
    /// `delay_for(1)` is the initial delay; each subsequent failure
    /// doubles it up to the ceiling.
    pub fn delay_for(&self, failures: u32) -> Option<Duration> {
        if failures == 0 || failures >= self.max_attempts {
            return None;
        }
        let doublings = failures.saturating_sub(1).min(31);
        let delay = self
            .initial_delay
            .checked_mul(1_u32.checked_shl(doublings).unwrap_or(u32::MAX))
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where the channel supervisor currently is in its lifecycle.
///
/// ```text
/// Connecting -> Connected <-> Disconnected -> (retry | GaveUp)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connect attempt is in flight.
    Connecting,
    /// The transport is up and the expedition room has been joined.
    Connected,
    /// The transport is down; a retry may still be scheduled.
    Disconnected,
    /// The failure budget is exhausted; no further retries.
    GaveUp,
}
