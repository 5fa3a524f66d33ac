//! Gateway Webhook Handling
//!
//! Processes payment notifications pushed by the gateway: look the payment
//! up, mirror its status into the cache and confirm it on approval.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use pix_core::wire::WebhookNotification;

use crate::dispatcher::{ConfirmationDispatch, ConfirmationDispatcher};
use crate::error::{PaymentError, Result};
use crate::gateway::{PaymentGateway, validate_payment_id};
use crate::status::{StatusCache, StatusTransition};

type HmacSha256 = Hmac<Sha256>;

/// What a notification did
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Not a payment notification, or one without a usable id
    Ignored { kind: String },

    /// Cache updated from the gateway record
    Updated {
        payment_id: String,
        transition: StatusTransition,
        /// True when this notification started the confirmation email
        confirmation_dispatched: bool,
    },
}

/// Webhook handler
#[derive(Clone)]
pub struct WebhookHandler {
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<dyn StatusCache>,
    dispatcher: ConfirmationDispatcher,
    secret: Option<String>,
}

impl WebhookHandler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<dyn StatusCache>,
        dispatcher: ConfirmationDispatcher,
    ) -> Self {
        Self {
            gateway,
            cache,
            dispatcher,
            secret: None,
        }
    }

    /// Require signed notifications
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub const fn verifies_signatures(&self) -> bool {
        self.secret.is_some()
    }

    /// Check the `x-signature` header when a secret is configured
    pub fn verify(
        &self,
        signature: Option<&str>,
        request_id: Option<&str>,
        data_id: &str,
    ) -> Result<()> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };
        let signature = signature
            .ok_or_else(|| PaymentError::WebhookSignature("missing x-signature header".into()))?;
        verify_signature(secret, signature, request_id.unwrap_or_default(), data_id)
    }

    /// Process a notification
    pub async fn handle(&self, notification: &WebhookNotification) -> Result<WebhookOutcome> {
        tracing::info!(kind = %notification.kind, "Processing gateway webhook");

        let Some(payment_id) = notification.payment_id() else {
            tracing::debug!(kind = %notification.kind, "Ignoring webhook notification");
            return Ok(WebhookOutcome::Ignored {
                kind: notification.kind.clone(),
            });
        };

        if let Err(e) = validate_payment_id(payment_id) {
            tracing::warn!(error = %e, "Ignoring webhook with malformed payment id");
            return Ok(WebhookOutcome::Ignored {
                kind: notification.kind.clone(),
            });
        }

        let details = self.gateway.get_payment(payment_id).await?;
        let transition = self.cache.set(payment_id, details.status.clone());

        tracing::info!(
            payment_id = %payment_id,
            status = %transition.current,
            previous = ?transition.previous,
            "Payment status updated from webhook"
        );

        let mut confirmation_dispatched = false;
        if transition.became_approved() {
            match details.payer_email.as_deref() {
                Some(email) => {
                    confirmation_dispatched = matches!(
                        self.dispatcher.confirm_payment(payment_id, email),
                        ConfirmationDispatch::Scheduled(_)
                    );
                }
                None => tracing::warn!(
                    payment_id = %payment_id,
                    "Approved payment has no payer email"
                ),
            }
        }

        Ok(WebhookOutcome::Updated {
            payment_id: payment_id.to_string(),
            transition,
            confirmation_dispatched,
        })
    }
}

/// Verify a Mercado Pago style signature header (`ts=...,v1=...`)
///
/// The signed manifest is `id:{data_id};request-id:{request_id};ts:{ts};`.
pub fn verify_signature(secret: &str, header: &str, request_id: &str, data_id: &str) -> Result<()> {
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value),
            Some(("v1", value)) => v1 = Some(value),
            _ => {}
        }
    }

    let ts = ts.ok_or_else(|| PaymentError::WebhookSignature("missing ts".into()))?;
    let v1 = v1.ok_or_else(|| PaymentError::WebhookSignature("missing v1".into()))?;
    let expected =
        hex::decode(v1).map_err(|e| PaymentError::WebhookSignature(format!("bad hex: {e}")))?;

    let manifest = format!("id:{};request-id:{request_id};ts:{ts};", data_id.to_lowercase());
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::WebhookSignature(e.to_string()))?;
    mac.update(manifest.as_bytes());

    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::WebhookSignature("signature mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MockGateway, PixPaymentRequest};
    use crate::mailer::MemoryMailer;
    use crate::status::MemoryStatusCache;
    use pix_core::{EmailAddress, PaymentStatus, RetryPolicy};
    use rust_decimal_macros::dec;

    fn sign(secret: &str, manifest: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn notification(id: &str) -> WebhookNotification {
        serde_json::from_value(serde_json::json!({"type": "payment", "data": {"id": id}})).unwrap()
    }

    async fn fixture() -> (WebhookHandler, Arc<MockGateway>, Arc<dyn StatusCache>, Arc<MemoryMailer>) {
        let gateway = Arc::new(MockGateway::starting_at(123));
        let cache: Arc<dyn StatusCache> = Arc::new(MemoryStatusCache::new());
        let mailer = Arc::new(MemoryMailer::new());
        let dispatcher = ConfirmationDispatcher::builder(mailer.clone())
            .policy(RetryPolicy::none())
            .build();

        let payment = gateway
            .create_payment(&PixPaymentRequest {
                email: EmailAddress::parse("a@b.com").unwrap(),
                amount: dec!(0.10),
                description: "test".into(),
            })
            .await
            .unwrap();
        cache.set(&payment.id, payment.status);

        let handler = WebhookHandler::new(gateway.clone(), cache.clone(), dispatcher);
        (handler, gateway, cache, mailer)
    }

    #[tokio::test]
    async fn test_approval_updates_cache_and_dispatches_once() {
        let (handler, gateway, cache, mailer) = fixture().await;
        gateway.set_status("123", PaymentStatus::Approved);

        let first = handler.handle(&notification("123")).await.unwrap();
        assert!(matches!(
            first,
            WebhookOutcome::Updated { confirmation_dispatched: true, .. }
        ));
        assert_eq!(cache.get("123"), PaymentStatus::Approved);

        let second = handler.handle(&notification("123")).await.unwrap();
        assert!(matches!(
            second,
            WebhookOutcome::Updated { confirmation_dispatched: false, .. }
        ));

        mailer.wait_for(1).await;
        assert_eq!(mailer.sent_to(), vec!["a@b.com".to_string()]);
    }

    #[tokio::test]
    async fn test_pending_update_does_not_dispatch() {
        let (handler, _gateway, cache, mailer) = fixture().await;

        let outcome = handler.handle(&notification("123")).await.unwrap();
        assert!(matches!(
            outcome,
            WebhookOutcome::Updated { confirmation_dispatched: false, .. }
        ));
        assert_eq!(cache.get("123"), PaymentStatus::Pending);
        assert_eq!(mailer.attempts(), 0);
    }

    #[tokio::test]
    async fn test_other_kinds_ignored() {
        let (handler, gateway, _cache, _mailer) = fixture().await;
        let n: WebhookNotification =
            serde_json::from_value(serde_json::json!({"type": "merchant_order", "data": {"id": "9"}}))
                .unwrap();

        let outcome = handler.handle(&n).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
        assert_eq!(gateway.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_id_never_reaches_gateway() {
        let (handler, gateway, _cache, _mailer) = fixture().await;

        let outcome = handler.handle(&notification("../../users/me")).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

        let no_id: WebhookNotification =
            serde_json::from_value(serde_json::json!({"type": "payment", "data": {}})).unwrap();
        let outcome = handler.handle(&no_id).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

        assert_eq!(gateway.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_an_error() {
        let (handler, gateway, _cache, _mailer) = fixture().await;
        gateway.set_failing(true);
        assert!(handler.handle(&notification("123")).await.is_err());
    }

    #[test]
    fn test_signature_roundtrip() {
        let v1 = sign("secret", "id:123;request-id:req-1;ts:1700000000;");
        let header = format!("ts=1700000000,v1={v1}");

        assert!(verify_signature("secret", &header, "req-1", "123").is_ok());
        assert!(verify_signature("other", &header, "req-1", "123").is_err());
        assert!(verify_signature("secret", &header, "req-2", "123").is_err());
        assert!(verify_signature("secret", "v1=abc", "req-1", "123").is_err());
    }

    #[tokio::test]
    async fn test_verify_is_noop_without_secret() {
        let (handler, ..) = fixture().await;
        assert!(!handler.verifies_signatures());
        assert!(handler.verify(None, None, "123").is_ok());

        let signed = handler.with_secret("secret");
        assert!(signed.verify(None, Some("req-1"), "123").is_err());
    }
}
