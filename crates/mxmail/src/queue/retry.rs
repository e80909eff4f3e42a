//! Retry policy for queued deliveries.
//!
//! Attempts are spaced by a fixed interval and capped by a limit. An entry
//! that has used up its attempts is never selected again.

use std::time::Duration;

use tokio::time::Instant;

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts per entry.
    pub retry_limit: u32,
    /// Minimum time between two attempts for the same entry.
    pub retry_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(240))
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(retry_limit: u32, retry_interval: Duration) -> Self {
        Self {
            retry_limit,
            retry_interval,
        }
    }

    /// Check if another attempt is allowed after `attempt_count` attempts.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.retry_limit
    }

    /// Get the number of remaining attempts.
    ///
    /// Returns `0` once the limit has been reached.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.retry_limit.saturating_sub(attempt_count)
    }

    /// Returns true if an entry may be attempted at `now`.
    #[must_use]
    pub fn is_eligible(
        &self,
        attempt_count: u32,
        last_attempt_at: Option<Instant>,
        now: Instant,
    ) -> bool {
        self.should_retry(attempt_count)
            && last_attempt_at
                .is_none_or(|last| now.saturating_duration_since(last) >= self.retry_interval)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));
        assert!(!policy.should_retry(100));
    }

    #[test]
    fn test_remaining_attempts() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.remaining_attempts(0), 4);
        assert_eq!(policy.remaining_attempts(3), 1);
        assert_eq!(policy.remaining_attempts(4), 0);
        assert_eq!(policy.remaining_attempts(9), 0); // Saturating
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_interval_spacing() {
        let policy = RetryPolicy::default();
        let last = Instant::now();

        assert!(policy.is_eligible(0, None, last));
        assert!(!policy.is_eligible(1, Some(last), last));
        assert!(!policy.is_eligible(1, Some(last), last + Duration::from_millis(239_999)));
        assert!(policy.is_eligible(1, Some(last), last + Duration::from_secs(240)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_never_eligible() {
        let policy = RetryPolicy::default();
        let last = Instant::now();

        assert!(!policy.is_eligible(4, Some(last), last + Duration::from_secs(86400)));
        assert!(!policy.is_eligible(5, None, last));
    }
}
