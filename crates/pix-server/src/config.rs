//! Server Configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;

use pix_core::RetryPolicy;
use pix_payments::StatusResolution;

/// Server settings read from the environment
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Directory served at `/`
    pub static_dir: PathBuf,

    /// Amount charged for every checkout, whatever the client sends
    pub amount: Decimal,

    /// Prefix of the gateway payment description
    pub description: String,

    /// How `GET /api/payment-status` answers
    pub status_resolution: StatusResolution,

    /// Retry schedule for server-sent confirmation emails
    pub email_retry: RetryPolicy,

    /// Shared secret for webhook signatures; unset accepts every notification
    pub webhook_secret: Option<String>,

    /// Recipient of `GET /api/test-email` when no address is given
    pub test_email: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            static_dir: PathBuf::from("static"),
            amount: Decimal::new(10, 2),
            description: "PIX payment".into(),
            status_resolution: StatusResolution::default(),
            email_retry: RetryPolicy::default(),
            webhook_secret: None,
            test_email: "teste@exemplo.com".into(),
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let amount = match env("CHECKOUT_AMOUNT") {
            Some(raw) => raw
                .parse::<Decimal>()
                .with_context(|| format!("CHECKOUT_AMOUNT is not a decimal: {raw}"))?,
            None => defaults.amount,
        };
        anyhow::ensure!(amount > Decimal::ZERO, "CHECKOUT_AMOUNT must be positive");

        let status_resolution = match env("STATUS_RESOLUTION") {
            Some(raw) => raw.parse()?,
            None => defaults.status_resolution,
        };

        let email_retry = RetryPolicy {
            max_attempts: parse_or("EMAIL_MAX_ATTEMPTS", defaults.email_retry.max_attempts)?,
            base_delay: Duration::from_millis(parse_or("EMAIL_RETRY_BASE_MS", 1000)?),
            multiplier: parse_or("EMAIL_RETRY_MULTIPLIER", defaults.email_retry.multiplier)?,
        };

        Ok(Self {
            bind_addr: env("BIND_ADDR").unwrap_or(defaults.bind_addr),
            static_dir: env("STATIC_DIR").map_or(defaults.static_dir, PathBuf::from),
            amount,
            description: env("CHECKOUT_DESCRIPTION").unwrap_or(defaults.description),
            status_resolution,
            email_retry,
            webhook_secret: env("MERCADOPAGO_WEBHOOK_SECRET"),
            test_email: env("TEST_EMAIL_ADDRESS").unwrap_or(defaults.test_email),
        })
    }
}

/// Set and non-empty
fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.amount, Decimal::new(10, 2));
        assert_eq!(config.status_resolution, StatusResolution::CacheBacked);
        assert_eq!(config.email_retry.max_attempts, 3);
        assert_eq!(config.email_retry.multiplier, 2);
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.test_email, "teste@exemplo.com");
    }

    #[test]
    fn test_parse_or_falls_back_when_unset() {
        let value: u32 = parse_or("PIX_SERVER_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
