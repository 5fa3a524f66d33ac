//! Mock Gateway
//!
//! In-memory gateway for tests and local demos. Payments start `pending`
//! and move only when a test (or a demo operator) sets their status.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use pix_core::PaymentStatus;

use super::{PaymentDetails, PaymentGateway, PixPayment, PixPaymentRequest};
use crate::error::{PaymentError, Result};

#[derive(Clone, Debug)]
struct MockPayment {
    email: String,
    status: PaymentStatus,
}

/// Scriptable in-memory gateway
pub struct MockGateway {
    payments: RwLock<HashMap<String, MockPayment>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    create_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Assign ids counting up from `first_id`
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            payments: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(first_id),
            failing: AtomicBool::new(false),
            create_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }

    /// Move a payment to a new status (what the gateway would do on settlement)
    pub fn set_status(&self, payment_id: &str, status: PaymentStatus) {
        let mut payments = self.payments.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(payment) = payments.get_mut(payment_id) {
            payment.status = status;
        }
    }

    /// Make every call fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Gateway("mock gateway unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment(&self, request: &PixPaymentRequest) -> Result<PixPayment> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let mut payments = self.payments.write().unwrap_or_else(PoisonError::into_inner);
        payments.insert(
            id.clone(),
            MockPayment {
                email: request.email.to_string(),
                status: PaymentStatus::Pending,
            },
        );

        Ok(PixPayment {
            qr_code: Some(format!("00020126580014br.gov.bcb.pix{id}")),
            qr_code_base64: Some("iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==".into()),
            status: PaymentStatus::Pending,
            id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let payments = self.payments.read().unwrap_or_else(PoisonError::into_inner);
        let payment = payments
            .get(payment_id)
            .ok_or_else(|| PaymentError::Gateway(format!("payment not found: {payment_id}")))?;

        Ok(PaymentDetails {
            id: payment_id.to_string(),
            status: payment.status.clone(),
            status_detail: None,
            payer_email: Some(payment.email.clone()),
        })
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pix_core::EmailAddress;
    use rust_decimal_macros::dec;

    fn request() -> PixPaymentRequest {
        PixPaymentRequest {
            email: EmailAddress::parse("a@b.com").unwrap(),
            amount: dec!(0.10),
            description: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_lifecycle() {
        let gateway = MockGateway::starting_at(123);

        let payment = gateway.create_payment(&request()).await.unwrap();
        assert_eq!(payment.id, "123");
        assert_eq!(payment.status, PaymentStatus::Pending);

        gateway.set_status("123", PaymentStatus::Approved);
        let details = gateway.get_payment("123").await.unwrap();
        assert_eq!(details.status, PaymentStatus::Approved);
        assert_eq!(details.payer_email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_failing_gateway() {
        let gateway = MockGateway::new();
        gateway.set_failing(true);

        assert!(gateway.create_payment(&request()).await.is_err());
        assert_eq!(gateway.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let gateway = MockGateway::new();
        assert!(gateway.get_payment("nope").await.is_err());
    }
}
