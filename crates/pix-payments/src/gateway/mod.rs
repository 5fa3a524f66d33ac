//! Payment Gateway Integration
//!
//! Abstraction over the external service of record for PIX payments.

mod mercadopago;
mod mock;

pub use mercadopago::{MercadoPagoClient, MercadoPagoConfig};
pub use mock::MockGateway;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pix_core::{EmailAddress, PaymentStatus};

use crate::error::{PaymentError, Result};

/// Request to create a PIX charge
#[derive(Clone, Debug)]
pub struct PixPaymentRequest {
    pub email: EmailAddress,
    pub amount: Decimal,
    pub description: String,
}

/// A freshly created PIX charge
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PixPayment {
    /// Gateway-assigned payment id
    pub id: String,

    /// PIX copy-and-paste code
    pub qr_code: Option<String>,

    /// QR code PNG, base64 encoded
    pub qr_code_base64: Option<String>,

    pub status: PaymentStatus,
}

/// Payment as currently known by the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub payer_email: Option<String>,
}

/// Payment gateway trait (Strategy pattern)
///
/// The gateway is authoritative; everything we store is a mirror of what it
/// answers here.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a PIX payment for the payer
    async fn create_payment(&self, request: &PixPaymentRequest) -> Result<PixPayment>;

    /// Look up the full payment record
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails>;

    /// Gateway name
    fn name(&self) -> &str;
}

/// Gateway ids are ASCII alphanumeric; anything else never reaches a URL
pub fn validate_payment_id(payment_id: &str) -> Result<()> {
    if payment_id.is_empty()
        || payment_id.len() > 64
        || !payment_id.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return Err(PaymentError::InvalidPaymentId(payment_id.to_string()));
    }
    Ok(())
}
