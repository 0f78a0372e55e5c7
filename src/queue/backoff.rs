//! Retry backoff for queued actions.

use std::time::Duration;

use crate::clock::duration_ms;
use crate::queue::PendingAction;

// == Backoff Policy ==
/// Exponential backoff: after `n` failed attempts the next try waits
/// `base * 2^(n-1)`, never more than `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(5 * 60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Wait before the next try after `attempts` failures.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempts - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Earliest time `action` may be replayed. Never-tried actions are due
    /// from the moment they were queued.
    pub fn next_retry_at(&self, action: &PendingAction) -> u64 {
        match action.last_attempt_at {
            Some(last) => last.saturating_add(duration_ms(self.delay_for(action.attempts))),
            None => action.enqueued_at,
        }
    }
}
