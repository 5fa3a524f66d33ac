//! Session Persistence
//!
//! The session is stored as flat string keys so it survives reloads in
//! `localStorage` and stays readable in the browser dev tools.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::session::{PaymentSession, QrPayload};

pub const KEY_PAYMENT_ID: &str = "paymentId";
pub const KEY_EMAIL: &str = "userEmail";
pub const KEY_CREATED_AT: &str = "paymentCreatedAt";
pub const KEY_CONFIRMED: &str = "paymentConfirmed";
pub const KEY_PIX_CODE: &str = "pixCode";
pub const KEY_PIX_CODE_BASE64: &str = "pixCodeBase64";

const ALL_KEYS: [&str; 6] = [
    KEY_PAYMENT_ID,
    KEY_EMAIL,
    KEY_CREATED_AT,
    KEY_CONFIRMED,
    KEY_PIX_CODE,
    KEY_PIX_CODE_BASE64,
];

/// Key-value storage backend (`localStorage` in the browser)
pub trait SessionStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str);
}

/// In-memory storage for tests and native clients
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// What was found on load
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Restored {
    /// Nothing stored
    Empty,

    /// Older than a day; cleared
    Expired,

    /// Already confirmed; cleared
    Confirmed,

    /// Unconfirmed and fresh: resume polling
    Resume(PaymentSession),
}

/// Typed access to the persisted session
pub struct SessionStore<S> {
    storage: S,
}

impl<S: SessionStorage> SessionStore<S> {
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    pub const fn storage(&self) -> &S {
        &self.storage
    }

    pub fn save(&self, session: &PaymentSession) -> Result<()> {
        self.storage.set(KEY_PAYMENT_ID, &session.payment_id)?;
        self.storage.set(KEY_EMAIL, &session.email)?;
        self.storage
            .set(KEY_CREATED_AT, &session.created_at.to_string())?;
        self.storage
            .set(KEY_CONFIRMED, if session.confirmed { "true" } else { "false" })?;

        let qr = session.qr.clone().unwrap_or_default();
        self.set_optional(KEY_PIX_CODE, qr.code.as_deref())?;
        self.set_optional(KEY_PIX_CODE_BASE64, qr.image_base64.as_deref())?;
        Ok(())
    }

    /// Stored session, if the required keys are present and readable
    pub fn load(&self) -> Option<PaymentSession> {
        let payment_id = self.storage.get(KEY_PAYMENT_ID)?;
        let email = self.storage.get(KEY_EMAIL).unwrap_or_default();
        let created_at = match self.storage.get(KEY_CREATED_AT)?.parse() {
            Ok(ms) => ms,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable payment timestamp in storage");
                return None;
            }
        };

        let qr = QrPayload {
            code: self.storage.get(KEY_PIX_CODE),
            image_base64: self.storage.get(KEY_PIX_CODE_BASE64),
        };

        let mut session = PaymentSession::new(payment_id, email, created_at).with_qr(qr);
        session.confirmed = self.storage.get(KEY_CONFIRMED).as_deref() == Some("true");
        Some(session)
    }

    pub fn mark_confirmed(&self) -> Result<()> {
        self.storage.set(KEY_CONFIRMED, "true")
    }

    pub fn clear(&self) {
        for key in ALL_KEYS {
            self.storage.remove(key);
        }
    }

    /// Load and discard sessions that must not resume
    pub fn restore(&self, now: i64) -> Restored {
        let Some(session) = self.load() else {
            if self.storage.get(KEY_PAYMENT_ID).is_some() {
                self.clear();
            }
            return Restored::Empty;
        };

        if session.confirmed {
            tracing::info!(payment_id = %session.payment_id, "Stored payment already confirmed");
            self.clear();
            return Restored::Confirmed;
        }

        if session.is_stale(now) {
            tracing::info!(
                payment_id = %session.payment_id,
                age_secs = session.age(now).as_secs(),
                "Stored payment expired"
            );
            self.clear();
            return Restored::Expired;
        }

        Restored::Resume(session)
    }

    fn set_optional(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.storage.set(key, value),
            None => {
                self.storage.remove(key);
                Ok(())
            }
        }
    }
}
