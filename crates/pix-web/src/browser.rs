//! Browser Glue
//!
//! `localStorage`, host detection, timers and console logging.

use std::time::Duration;

use leptos::prelude::set_timeout;
use wasm_bindgen::JsValue;

use pix_client::{ClientError, SessionStorage, SessionStore};
use pix_core::Deployment;

/// `window.localStorage`
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok().flatten()?;
        Some(Self { storage })
    }
}

impl SessionStorage for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> pix_client::Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| ClientError::Storage(js_error(&e)))
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            log_error(&format!("Could not remove {key}: {}", js_error(&e)));
        }
    }
}

/// Session store over `localStorage`, if the browser allows it
pub fn session_store() -> Option<SessionStore<LocalStorage>> {
    LocalStorage::open().map(SessionStore::new)
}

/// Page origin, e.g. `https://checkout.example.com`
pub fn origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into())
}

pub fn deployment() -> Deployment {
    let hostname = web_sys::window()
        .and_then(|w| w.location().hostname().ok())
        .unwrap_or_default();
    Deployment::from_hostname(&hostname)
}

pub fn page_visible() -> bool {
    web_sys::window()
        .and_then(|w| w.document())
        .is_some_and(|d| d.visibility_state() == web_sys::VisibilityState::Visible)
}

/// Resolves after `duration` using `setTimeout`
pub async fn sleep(duration: Duration) {
    let (tx, rx) = futures::channel::oneshot::channel::<()>();
    set_timeout(
        move || {
            let _ = tx.send(());
        },
        duration,
    );
    let _ = rx.await;
}

/// Copy text with the async clipboard API
pub async fn copy_to_clipboard(text: &str) -> Result<(), String> {
    let window = web_sys::window().ok_or("no window")?;
    let promise = window.navigator().clipboard().write_text(text);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| js_error(&e))
}

pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

pub fn log_error(message: &str) {
    web_sys::console::error_1(&JsValue::from_str(message));
}

fn js_error(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
