//! # pix-payments
//!
//! PIX payment processing and confirmation delivery for the checkout.
//!
//! ## Reconciliation
//!
//! Settlement is observed from three places, all converging on the same
//! status cache and the same dispatcher:
//!
//! ```text
//! ┌─────────────┐  create   ┌───────────────┐
//! │  checkout   │──────────▶│    Gateway    │
//! └─────────────┘           └───────────────┘
//!        │ cache.set(pending)      │ webhook (type=payment)
//!        ▼                         ▼
//! ┌─────────────┐  resolve  ┌───────────────┐  approved  ┌──────────────┐
//! │ StatusCache │◀──────────│ WebhookHandler│───────────▶│  Dispatcher  │
//! └─────────────┘           └───────────────┘            │ (ledger +    │
//!        ▲                                               │  backoff)    │
//!        └── StatusResolver (cache | direct lookup) ────▶└──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pix_payments::{MercadoPagoClient, PaymentGateway, PixPaymentRequest};
//!
//! let gateway = MercadoPagoClient::from_env()?;
//! let payment = gateway.create_payment(&PixPaymentRequest {
//!     email: EmailAddress::parse("user@example.com")?,
//!     amount: dec!(0.10),
//!     description: "PIX payment - user@example.com".into(),
//! }).await?;
//!
//! // Show payment.qr_code_base64 and payment.qr_code to the payer
//! ```

mod dispatcher;
mod error;
mod gateway;
mod mailer;
mod status;
mod webhook;

pub use dispatcher::{
    ConfirmationDispatch, ConfirmationDispatcher, DeliveryLedger, DispatcherBuilder, RetryHandle,
    SendOutcome,
};
pub use error::{PaymentError, Result};
pub use gateway::{
    MercadoPagoClient, MercadoPagoConfig, MockGateway, PaymentDetails, PaymentGateway, PixPayment,
    PixPaymentRequest, validate_payment_id,
};
pub use mailer::{
    ConfirmationTemplate, HttpMailer, HttpMailerConfig, LogMailer, Mailer, MemoryMailer,
    OutgoingEmail,
};
pub use status::{
    MemoryStatusCache, ResolvedStatus, StatusCache, StatusResolution, StatusResolver,
    StatusTransition,
};
pub use webhook::{WebhookHandler, WebhookOutcome, verify_signature};
