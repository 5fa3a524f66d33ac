//! Retry Policy
//!
//! One policy type covers the three delivery behaviours the checkout has
//! shipped with: a single attempt, a fixed-delay chain and exponential
//! backoff. Drivers (tokio on the server, browser timers in the client) ask
//! the policy for the wait before each retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry schedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Wait before the first retry
    pub base_delay: Duration,

    /// Factor applied to the wait after every retry (1 = fixed delay)
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Doubling backoff
    pub const fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2,
        }
    }

    /// Same wait between every attempt
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            multiplier: 1,
        }
    }

    /// Single attempt
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Attempts actually made (a zero budget still tries once)
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait before attempt number `attempt` (1-based); the first attempt runs
    /// immediately
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.max(1).saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor)
    }

    /// All waits between attempts, in order
    pub fn delays(&self) -> Vec<Duration> {
        (2..=self.attempts()).map(|n| self.delay_before(n)).collect()
    }
}

/// How a retry chain ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RetryOutcome {
    /// An attempt succeeded
    Succeeded { attempts: u32 },

    /// Every attempt failed
    Exhausted { attempts: u32 },

    /// The chain was cancelled before finishing
    Cancelled { attempts: u32 },
}

impl RetryOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts }
            | Self::Exhausted { attempts }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays_double() {
        let policy = RetryPolicy::exponential(4, Duration::from_secs(1));
        assert_eq!(
            policy.delays(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn test_delays_strictly_increase_under_backoff() {
        let delays = RetryPolicy::default().delays();
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_fixed_and_none() {
        let fixed = RetryPolicy::fixed(3, Duration::from_millis(500));
        assert_eq!(fixed.delays(), vec![Duration::from_millis(500); 2]);

        let none = RetryPolicy::none();
        assert_eq!(none.attempts(), 1);
        assert!(none.delays().is_empty());
    }

    #[test]
    fn test_zero_budget_still_attempts_once() {
        let policy = RetryPolicy::exponential(0, Duration::from_secs(1));
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn test_first_attempt_is_immediate() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(1));
    }
}
