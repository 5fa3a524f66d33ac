//! Payment Error Types

use thiserror::Error;

use pix_core::CoreError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Request rejected before reaching the gateway
    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    /// Gateway call failed or answered with an error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Gateway answered with a body we could not read
    #[error("Gateway response invalid: {0}")]
    GatewayResponse(String),

    /// Email transport failed
    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    /// Payment id that cannot be a gateway id
    #[error("Invalid payment id: {0:?}")]
    InvalidPaymentId(String),

    /// Confirmation requested for a payment that is not approved
    #[error("Payment {0} is not approved")]
    NotApproved(String),

    /// Confirmation requested for an address other than the payer's
    #[error("Email does not match the payer of payment {0}")]
    RecipientMismatch(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::EmailDelivery(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(e) => e.user_message(),
            Self::Gateway(_) | Self::GatewayResponse(_) => {
                "Payment processing failed. Please try again."
            }
            Self::EmailDelivery(_) => "The confirmation email could not be sent.",
            Self::InvalidPaymentId(_) => "Invalid payment id.",
            Self::NotApproved(_) => "This payment has not been approved yet.",
            Self::RecipientMismatch(_) => "The email does not match this payment.",
            Self::Config(_) => "Service configuration error.",
            Self::WebhookSignature(_) => "An error occurred processing your request.",
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::GatewayResponse(err.to_string())
        } else {
            Self::Gateway(err.to_string())
        }
    }
}
