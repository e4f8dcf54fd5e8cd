use std::time::Duration;

use signup_gateway_core::config::RetryConfig;

/// Exponential backoff between submissions of the same email.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the failed `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool { attempt < self.max_attempts }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(RetryConfig { max_attempts, initial_backoff, max_backoff }: RetryConfig) -> Self {
        Self { max_attempts: max_attempts.max(1), initial_backoff, max_backoff }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(3),
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(3));
        assert_eq!(policy.backoff(40), Duration::from_secs(3));

        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }

    #[test]
    fn test_zero_attempts_still_sends_once() {
        let policy = RetryPolicy::from(RetryConfig {
            max_attempts: 0,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
        });
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1));
    }
}
