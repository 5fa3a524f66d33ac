//! # pix-client
//!
//! Browser-side checkout logic, kept free of any UI so it runs (and is
//! tested) natively as well as in WASM.
//!
//! ```text
//! form ──validate──▶ CheckoutApi::create_payment ──▶ SessionStore::save
//!                                                        │
//!              ┌─────────────────────────────────────────┘
//!              ▼
//!         PollerCore (Idle → Polling → Confirmed)
//!              │ approved, once
//!              ├──▶ SessionStore::mark_confirmed + clear
//!              └──▶ dispatch_confirmation_email (backoff)
//! ```
//!
//! The `runtime` feature adds tokio drivers for the poller and the email
//! dispatch; the web app drives the same state machine with browser timers.

pub mod api;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod notify;
pub mod poller;
#[cfg(feature = "runtime")]
pub mod runtime;
pub mod session;
pub mod storage;

pub use api::{CheckoutApi, HttpCheckoutApi};
pub use dispatch::{DispatchReport, dispatch_confirmation_email};
pub use error::{ClientError, Result};
pub use form::{FormErrors, validate_checkout_form};
pub use notify::{NOTIFICATION_TIMEOUT, Notification, NotificationKind};
pub use poller::{PollEvent, PollState, PollerCore};
#[cfg(feature = "runtime")]
pub use runtime::{Poller, spawn_confirmation_email};
pub use session::{PaymentSession, QrPayload, now_ms};
pub use storage::{MemoryStorage, Restored, SessionStorage, SessionStore};
