//! Email Transport
//!
//! Supports three transports:
//! 1. HTTP email API (Resend-compatible, default when an API key is set)
//! 2. Log only (no API key: the email is logged and counted as sent)
//! 3. In-memory recorder for tests and demos

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::{PaymentError, Result};

const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_ACCESS_LINK: &str = "https://example.com/access";

/// A rendered email ready for the transport
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Email transport trait
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hand one email to the transport
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;

    /// Transport name
    fn name(&self) -> &str;
}

/// Fixed confirmation email content
#[derive(Clone, Debug)]
pub struct ConfirmationTemplate {
    pub from: String,
    pub subject: String,
    pub access_link: String,
}

impl Default for ConfirmationTemplate {
    fn default() -> Self {
        Self {
            from: "Payment Confirmation <no-reply@example.com>".into(),
            subject: "Thank you for your purchase!".into(),
            access_link: DEFAULT_ACCESS_LINK.into(),
        }
    }
}

impl ConfirmationTemplate {
    /// Create from environment variables, keeping defaults for unset ones
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            from: std::env::var("EMAIL_FROM").unwrap_or(defaults.from),
            subject: std::env::var("EMAIL_SUBJECT").unwrap_or(defaults.subject),
            access_link: std::env::var("EMAIL_ACCESS_LINK").unwrap_or(defaults.access_link),
        }
    }

    /// Render the confirmation email for a recipient
    pub fn render(&self, to: &str) -> OutgoingEmail {
        let text = format!(
            "{}\n\nYour payment was confirmed.\n\nHere is your access link:\n{}\n",
            self.subject, self.access_link
        );
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 5px;">
<h2 style="color: #333;">{subject}</h2>
<p style="font-size: 16px; line-height: 1.5;">Your payment was confirmed.</p>
<p style="font-size: 16px; line-height: 1.5;">Here is your access link:</p>
<p style="text-align: center;">
<a href="{link}" style="display: inline-block; background-color: #4CAF50; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; font-weight: bold;">Open content</a>
</p>
<p style="margin-top: 20px; font-size: 14px;">Direct link: <a href="{link}">{link}</a></p>
</div>"#,
            subject = self.subject,
            link = self.access_link,
        );

        OutgoingEmail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: self.subject.clone(),
            html,
            text,
        }
    }
}

/// HTTP email API configuration
#[derive(Clone, Debug)]
pub struct HttpMailerConfig {
    pub api_key: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl HttpMailerConfig {
    /// Create from environment variables; `None` without an API key
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("EMAIL_API_KEY").ok().filter(|k| !k.is_empty())?;
        let api_url =
            std::env::var("EMAIL_API_URL").unwrap_or_else(|_| DEFAULT_EMAIL_API_URL.into());
        let timeout = std::env::var("EMAIL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(Duration::from_secs(10), Duration::from_secs);

        Some(Self {
            api_key,
            api_url,
            timeout,
        })
    }
}

/// Email API request body
#[derive(Debug, Serialize)]
struct EmailApiRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Mailer backed by an HTTP email API
pub struct HttpMailer {
    client: Client,
    config: HttpMailerConfig,
}

impl HttpMailer {
    pub fn new(config: HttpMailerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let body = EmailApiRequest {
            from: &email.from,
            to: vec![&email.to],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::EmailDelivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::EmailDelivery(format!("{status}: {body}")));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "HttpMailer"
    }
}

/// Mailer that only logs (email delivery disabled)
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email delivery disabled, logging confirmation email instead"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "LogMailer"
    }
}

/// Recording mailer (for tests and demos)
///
/// Can be told to fail a number of sends before succeeding.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    notify: Notify,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` sends
    pub fn failing(count: usize) -> Self {
        let mailer = Self::default();
        mailer.failures_left.store(count, Ordering::SeqCst);
        mailer
    }

    /// Every transport call, failed or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successfully delivered emails
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recipients of delivered emails, in order
    pub fn sent_to(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.to).collect()
    }

    /// Wait until at least `count` emails were delivered
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.sent.lock().unwrap_or_else(PoisonError::into_inner).len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PaymentError::EmailDelivery("simulated transport failure".into()));
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.clone());
        self.notify.notify_waiters();
        Ok(())
    }

    fn name(&self) -> &str {
        "MemoryMailer"
    }
}
