//! Reconnect backoff policy
//!
//! Linear growth with a ceiling: attempt 0 connects immediately, every later
//! attempt waits `base * attempt`, never more than `cap`.

use std::time::Duration;

/// Default step between attempts
pub const DEFAULT_BASE: Duration = Duration::from_secs(2);
/// Default ceiling
pub const DEFAULT_CAP: Duration = Duration::from_secs(30);

/// Maps an attempt counter to the delay before that attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before attempt number `attempt`. `0` means no wait.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base.saturating_mul(attempt).min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_CAP)
    }
}

/// Delay for `attempt` under the default policy (2s steps, 30s cap).
pub fn next_delay(attempt: u32) -> Duration {
    BackoffPolicy::default().next_delay(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_has_no_delay() {
        assert_eq!(next_delay(0), Duration::ZERO);
    }

    #[test]
    fn test_delay_grows_linearly() {
        let delays: Vec<u64> = (1..=5).map(|a| next_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_delay_is_capped() {
        assert_eq!(next_delay(15), Duration::from_secs(30));
        assert_eq!(next_delay(16), Duration::from_secs(30));
        assert_eq!(next_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_custom_policy() {
        let policy = BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(25));
        assert_eq!(policy.next_delay(1), Duration::from_millis(10));
        assert_eq!(policy.next_delay(2), Duration::from_millis(20));
        assert_eq!(policy.next_delay(3), Duration::from_millis(25));
    }
}
