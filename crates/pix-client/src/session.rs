//! Client Payment Session
//!
//! What the browser remembers about the payment in progress.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use pix_core::SESSION_MAX_AGE;

/// Milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Cached QR payload so a reload can show the payment again
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// PIX copy-and-paste code
    pub code: Option<String>,

    /// QR code PNG, base64 encoded
    pub image_base64: Option<String>,
}

impl QrPayload {
    pub const fn is_empty(&self) -> bool {
        self.code.is_none() && self.image_base64.is_none()
    }

    /// `data:` URL for an `<img>` tag
    pub fn image_src(&self) -> Option<String> {
        self.image_base64
            .as_deref()
            .map(|b64| format!("data:image/png;base64,{b64}"))
    }
}

/// Payment in progress
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub payment_id: String,
    pub email: String,

    /// Creation time, ms since epoch
    pub created_at: i64,

    pub confirmed: bool,
    pub qr: Option<QrPayload>,
}

impl PaymentSession {
    pub fn new(payment_id: impl Into<String>, email: impl Into<String>, created_at: i64) -> Self {
        Self {
            payment_id: payment_id.into(),
            email: email.into(),
            created_at,
            confirmed: false,
            qr: None,
        }
    }

    #[must_use]
    pub fn with_qr(mut self, qr: QrPayload) -> Self {
        self.qr = (!qr.is_empty()).then_some(qr);
        self
    }

    /// Age at `now`; a creation time in the future counts as zero
    pub fn age(&self, now: i64) -> Duration {
        u64::try_from(now.saturating_sub(self.created_at)).map_or(Duration::ZERO, Duration::from_millis)
    }

    pub fn is_stale(&self, now: i64) -> bool {
        self.age(now) > SESSION_MAX_AGE
    }

    /// A confirmed session never polls again
    pub fn should_resume(&self, now: i64) -> bool {
        !self.confirmed && !self.is_stale(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    #[test]
    fn test_fresh_session_resumes() {
        let session = PaymentSession::new("123", "a@b.com", 0);
        assert!(session.should_resume(HOUR_MS));
    }

    #[test]
    fn test_stale_after_a_day() {
        let session = PaymentSession::new("123", "a@b.com", 0);
        assert!(!session.is_stale(24 * HOUR_MS));
        assert!(session.is_stale(25 * HOUR_MS));
        assert!(!session.should_resume(25 * HOUR_MS));
    }

    #[test]
    fn test_confirmed_never_resumes() {
        let mut session = PaymentSession::new("123", "a@b.com", 0);
        session.confirmed = true;
        assert!(!session.should_resume(1));
    }

    #[test]
    fn test_clock_skew_is_not_negative_age() {
        let session = PaymentSession::new("123", "a@b.com", 10 * HOUR_MS);
        assert_eq!(session.age(0), Duration::ZERO);
    }

    #[test]
    fn test_empty_qr_dropped() {
        let session = PaymentSession::new("1", "a@b.com", 0).with_qr(QrPayload::default());
        assert!(session.qr.is_none());

        let qr = QrPayload {
            code: None,
            image_base64: Some("AAAA".into()),
        };
        assert_eq!(qr.image_src().as_deref(), Some("data:image/png;base64,AAAA"));
    }
}
