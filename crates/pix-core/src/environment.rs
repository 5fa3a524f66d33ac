//! Deployment Environment
//!
//! Local hosts poll and retry faster than production to keep request volume
//! bounded against the real gateway.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// A persisted client session older than this is discarded on load
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Where the client is running, inferred from the host name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    Local,
    Production,
}

impl Deployment {
    pub fn from_hostname(hostname: &str) -> Self {
        match hostname.trim_start_matches('[').trim_end_matches(']') {
            "localhost" | "127.0.0.1" | "::1" | "0.0.0.0" => Self::Local,
            _ => Self::Production,
        }
    }

    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Interval between status queries
    pub const fn poll_interval(self) -> Duration {
        match self {
            Self::Local => Duration::from_secs(3),
            Self::Production => Duration::from_secs(8),
        }
    }

    /// Grace period before the client asks the server to send the
    /// confirmation email
    pub const fn email_dispatch_delay(self) -> Duration {
        match self {
            Self::Local => Duration::ZERO,
            Self::Production => Duration::from_secs(2),
        }
    }

    /// Backoff for client-triggered confirmation emails
    pub const fn email_retry_policy(self) -> RetryPolicy {
        match self {
            Self::Local => RetryPolicy::exponential(3, Duration::from_secs(1)),
            Self::Production => RetryPolicy::exponential(3, Duration::from_secs(3)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_detection() {
        assert_eq!(Deployment::from_hostname("localhost"), Deployment::Local);
        assert_eq!(Deployment::from_hostname("127.0.0.1"), Deployment::Local);
        assert_eq!(Deployment::from_hostname("[::1]"), Deployment::Local);
        assert_eq!(
            Deployment::from_hostname("checkout.example.com"),
            Deployment::Production
        );
    }

    #[test]
    fn test_production_is_slower() {
        assert!(Deployment::Production.poll_interval() > Deployment::Local.poll_interval());
        assert!(
            Deployment::Production.email_retry_policy().base_delay
                > Deployment::Local.email_retry_policy().base_delay
        );
    }
}
