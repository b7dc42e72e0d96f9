//! Backoff Policy
//!
//! Pure mapping from attempt number to retry delay, with an attempt ceiling.

use std::time::Duration;

/// Exponential backoff with a hard cap.
///
/// The delay after failed attempt `n` is `min(base * multiplier^n, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay unit
    pub base: Duration,
    /// Growth factor per attempt
    pub multiplier: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Attempts per sequence, and the size of the shared retry budget
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            multiplier: 2,
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after `attempt` failed, before trying `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.max_delay.as_millis() as u64;
        let base = self.base.as_millis() as u64;

        let millis = (self.multiplier as u64)
            .checked_pow(attempt)
            .and_then(|factor| base.checked_mul(factor))
            .map_or(cap, |ms| ms.min(cap));

        Duration::from_millis(millis)
    }

    /// Whether a failure at `attempt` is followed by another attempt.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Bring an attempt number into `1..=max_attempts`.
    pub fn clamp_attempt(&self, attempt: u32) -> u32 {
        attempt.clamp(1, self.max_attempts.max(1))
    }

    /// Every delay a fully failing sequence waits, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(move |attempt| self.delay_for(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base, Duration::from_secs(1));
        assert_eq!(policy.multiplier, 2);
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn test_delay_doubles_from_attempt_one() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(16000));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(5), Duration::from_millis(30000));
        assert_eq!(policy.delay_for(20), Duration::from_millis(30000));
        // 2^200 overflows u64
        assert_eq!(policy.delay_for(200), Duration::from_millis(30000));
    }

    #[test]
    fn test_delay_matches_formula_for_all_retried_attempts() {
        let policy = BackoffPolicy::default();
        for attempt in 1..policy.max_attempts {
            let expected = (1000u64 * 2u64.pow(attempt)).min(30000);
            assert_eq!(policy.delay_for(attempt), Duration::from_millis(expected));
        }
    }

    #[test]
    fn test_should_retry() {
        let policy = BackoffPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn test_clamp_attempt() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.clamp_attempt(0), 1);
        assert_eq!(policy.clamp_attempt(3), 3);
        assert_eq!(policy.clamp_attempt(99), 5);
    }

    #[test]
    fn test_schedule() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = policy.schedule().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000]);
        assert_eq!(policy.schedule().sum::<Duration>(), Duration::from_secs(30));
    }

    #[test]
    fn test_custom_policy() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(10),
            multiplier: 3,
            max_delay: Duration::from_millis(100),
            max_attempts: 3,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(30));
        assert_eq!(policy.delay_for(2), Duration::from_millis(90));
        assert_eq!(policy.delay_for(3), Duration::from_millis(100));
        assert_eq!(policy.schedule().count(), 2);
    }
}
