//! # pix-core
//!
//! Shared domain types for the PIX checkout flow.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  HTTP/JSON   ┌──────────────┐   REST   ┌──────────────┐
//! │  pix-client  │─────────────▶│  pix-server  │─────────▶│   Gateway    │
//! │  (poller)    │◀─────────────│  (axum)      │◀─────────│ (Mercado Pago)│
//! └──────────────┘              └──────────────┘  webhook └──────────────┘
//!        │                             │
//!        └──────────── pix-core ───────┘
//!          status, wire types, retry policy, deployment
//! ```
//!
//! Everything in this crate compiles for both native targets and
//! `wasm32-unknown-unknown`, so the browser client and the server agree on
//! the wire format and on the validation rules.

pub mod email;
pub mod environment;
pub mod error;
pub mod retry;
pub mod status;
pub mod wire;

pub use email::{EmailAddress, is_valid_email};
pub use environment::{Deployment, SESSION_MAX_AGE};
pub use error::{CoreError, Result};
pub use retry::{RetryOutcome, RetryPolicy};
pub use status::PaymentStatus;
